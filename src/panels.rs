use crate::app::App;
use crate::docker::ServiceSet;
use crate::model::{
    ActionMap, Container, Image, Network, ResourceItem, ResourceKind, SwarmNode, SwarmService,
    Volume,
};
use crate::registry::{RefreshFn, ViewDescriptor, ViewRegistry};
use crate::view::{ItemAction, Panel, ResourceView};
use tracing::warn;

/// One controller per resource kind.
pub struct Panels {
    containers: ResourceView<Container>,
    images: ResourceView<Image>,
    volumes: ResourceView<Volume>,
    networks: ResourceView<Network>,
    services: ResourceView<SwarmService>,
    nodes: ResourceView<SwarmNode>,
}

impl Panels {
    /// Each table gates keys with the action map its registry descriptor renders as the legend.
    pub fn new(registry: &ViewRegistry) -> Self {
        let actions = |kind: ResourceKind| {
            registry
                .get(kind.name())
                .map(|descriptor| descriptor.actions.clone())
                .unwrap_or_else(|| kind.actions())
        };
        Self {
            containers: container_view(actions(ResourceKind::Containers)),
            images: removable_view(actions(ResourceKind::Images)),
            volumes: removable_view(actions(ResourceKind::Volumes)),
            networks: removable_view(actions(ResourceKind::Networks)),
            services: service_view(actions(ResourceKind::Services)),
            nodes: node_view(actions(ResourceKind::Nodes)),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> &dyn Panel {
        match kind {
            ResourceKind::Containers => &self.containers,
            ResourceKind::Images => &self.images,
            ResourceKind::Volumes => &self.volumes,
            ResourceKind::Networks => &self.networks,
            ResourceKind::Services => &self.services,
            ResourceKind::Nodes => &self.nodes,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut dyn Panel {
        match kind {
            ResourceKind::Containers => &mut self.containers,
            ResourceKind::Images => &mut self.images,
            ResourceKind::Volumes => &mut self.volumes,
            ResourceKind::Networks => &mut self.networks,
            ResourceKind::Services => &mut self.services,
            ResourceKind::Nodes => &mut self.nodes,
        }
    }
}

fn container_view(actions: ActionMap) -> ResourceView<Container> {
    ResourceView::new(actions)
        .with_handler(|key, container: &Container| {
            let item = container.item_ref();
            match key {
                's' => Some(ItemAction::Start(item)),
                'S' => Some(ItemAction::Stop(item)),
                'r' => Some(ItemAction::Restart(item)),
                'd' => Some(ItemAction::Remove(item)),
                'a' => Some(ItemAction::Attach(item)),
                'l' => Some(ItemAction::Logs(item)),
                'i' => Some(ItemAction::Inspect(item)),
                'e' => Some(ItemAction::Exec(item)),
                _ => None,
            }
        })
        .with_details(|container: &Container| ItemAction::Inspect(container.item_ref()))
        .with_detail_actions(ActionMap::new(&[
            ('d', "Delete"),
            ('i', "Inspect"),
            ('l', "Logs"),
            ('a', "Attach"),
        ]))
}

/// Images, volumes and networks: remove and inspect only. `d` is accepted so the
/// default detail actions work.
fn removable_view<T: ResourceItem>(actions: ActionMap) -> ResourceView<T> {
    ResourceView::new(actions)
        .with_handler(|key, item: &T| match key {
            'r' | 'd' => Some(ItemAction::Remove(item.item_ref())),
            'i' => Some(ItemAction::Inspect(item.item_ref())),
            _ => None,
        })
        .with_details(|item: &T| ItemAction::Inspect(item.item_ref()))
}

fn service_view(actions: ActionMap) -> ResourceView<SwarmService> {
    ResourceView::new(actions)
        .with_handler(|key, service: &SwarmService| {
            let item = service.item_ref();
            match key {
                'i' => Some(ItemAction::Inspect(item)),
                's' => Some(ItemAction::Scale(item)),
                'r' | 'd' => Some(ItemAction::Remove(item)),
                'l' => Some(ItemAction::Logs(item)),
                _ => None,
            }
        })
        .with_details(|service: &SwarmService| ItemAction::Inspect(service.item_ref()))
        .with_detail_actions(ActionMap::new(&[
            ('d', "Delete"),
            ('i', "Inspect"),
            ('s', "Scale"),
            ('l', "Logs"),
        ]))
}

fn node_view(actions: ActionMap) -> ResourceView<SwarmNode> {
    ResourceView::new(actions)
        .with_handler(|key, node: &SwarmNode| {
            let item = node.item_ref();
            match key {
                'i' => Some(ItemAction::Inspect(item)),
                'a' => Some(ItemAction::Availability(item)),
                'r' | 'd' => Some(ItemAction::Remove(item)),
                _ => None,
            }
        })
        .with_details(|node: &SwarmNode| ItemAction::Inspect(node.item_ref()))
        .with_detail_actions(ActionMap::new(&[
            ('d', "Delete"),
            ('i', "Inspect"),
            ('a', "Availability"),
        ]))
}

fn refresh_for(kind: ResourceKind) -> RefreshFn {
    match kind {
        ResourceKind::Containers => {
            (|app: &mut App| app.request_list(ResourceKind::Containers)) as RefreshFn
        }
        ResourceKind::Images => {
            (|app: &mut App| app.request_list(ResourceKind::Images)) as RefreshFn
        }
        ResourceKind::Volumes => {
            (|app: &mut App| app.request_list(ResourceKind::Volumes)) as RefreshFn
        }
        ResourceKind::Networks => {
            (|app: &mut App| app.request_list(ResourceKind::Networks)) as RefreshFn
        }
        ResourceKind::Services => {
            (|app: &mut App| app.request_list(ResourceKind::Services)) as RefreshFn
        }
        ResourceKind::Nodes => {
            (|app: &mut App| app.request_list(ResourceKind::Nodes)) as RefreshFn
        }
    }
}

/// One descriptor per kind. Action maps come from the backing service.
pub fn build_registry(services: &ServiceSet) -> ViewRegistry {
    let mut registry = ViewRegistry::new();
    for kind in ResourceKind::ALL {
        let actions = match services.get(kind) {
            Ok(service) => service.actions(),
            Err(error) => {
                warn!(view = kind.name(), error = %error, "no backing service, using static actions");
                kind.actions()
            }
        };
        registry.register(
            ViewDescriptor::new(kind.name(), kind.title(), kind.shortcut(), kind)
                .with_refresh(refresh_for(kind))
                .with_legends(actions, kind.navigation_legend()),
        );
    }
    registry
}
