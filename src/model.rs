use serde::Deserialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Containers,
    Images,
    Volumes,
    Networks,
    Services,
    Nodes,
}

impl ResourceKind {
    pub const ALL: [Self; 6] = [
        Self::Containers,
        Self::Images,
        Self::Volumes,
        Self::Networks,
        Self::Services,
        Self::Nodes,
    ];

    /// Registry key of the view showing this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Containers => "containers",
            Self::Images => "images",
            Self::Volumes => "volumes",
            Self::Networks => "networks",
            Self::Services => "swarmServices",
            Self::Nodes => "swarmNodes",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Containers => "Containers",
            Self::Images => "Images",
            Self::Volumes => "Volumes",
            Self::Networks => "Networks",
            Self::Services => "Swarm Services",
            Self::Nodes => "Swarm Nodes",
        }
    }

    /// Singular noun used in prompts ("Delete container web?").
    pub fn noun(self) -> &'static str {
        match self {
            Self::Containers => "container",
            Self::Images => "image",
            Self::Volumes => "volume",
            Self::Networks => "network",
            Self::Services => "service",
            Self::Nodes => "node",
        }
    }

    pub fn shortcut(self) -> char {
        match self {
            Self::Containers => 'c',
            Self::Images => 'i',
            Self::Volumes => 'v',
            Self::Networks => 'n',
            Self::Services => 's',
            Self::Nodes => 'w',
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "c" | "ctr" | "container" | "containers" => Some(Self::Containers),
            "img" | "image" | "images" => Some(Self::Images),
            "vol" | "volume" | "volumes" => Some(Self::Volumes),
            "net" | "network" | "networks" => Some(Self::Networks),
            "svc" | "service" | "services" | "swarmservices" | "swarm-services" => {
                Some(Self::Services)
            }
            "no" | "node" | "nodes" | "swarmnodes" | "swarm-nodes" => Some(Self::Nodes),
            _ => None,
        }
    }

    pub fn actions(self) -> ActionMap {
        match self {
            Self::Containers => ActionMap::new(&[
                ('s', "Start"),
                ('S', "Stop"),
                ('r', "Restart"),
                ('d', "Delete"),
                ('a', "Attach"),
                ('l', "Logs"),
                ('i', "Inspect"),
                ('e', "Exec"),
            ]),
            Self::Images | Self::Volumes | Self::Networks => {
                ActionMap::new(&[('r', "Remove"), ('i', "Inspect")])
            }
            Self::Services => ActionMap::new(&[
                ('i', "Inspect"),
                ('s', "Scale"),
                ('r', "Remove"),
                ('l', "Logs"),
            ]),
            Self::Nodes => ActionMap::new(&[
                ('i', "Inspect"),
                ('a', "Availability"),
                ('r', "Remove"),
            ]),
        }
    }

    pub fn navigation_legend(self) -> &'static str {
        "↑/↓: Navigate\n<enter> Details\n<:> Command mode\n/: Filter"
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.noun())
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ActionMap(Vec<(char, String)>);

impl ActionMap {
    pub fn new(entries: &[(char, &str)]) -> Self {
        let mut map = Self::default();
        for (key, label) in entries {
            map.insert(*key, *label);
        }
        map
    }

    pub fn fallback() -> Self {
        Self::new(&[('d', "Delete"), ('i', "Inspect")])
    }

    pub fn insert(&mut self, key: char, label: impl Into<String>) {
        let label = label.into();
        if let Some(entry) = self.0.iter_mut().find(|(existing, _)| *existing == key) {
            entry.1 = label;
        } else {
            self.0.push((key, label));
        }
    }

    pub fn contains(&self, key: char) -> bool {
        self.0.iter().any(|(existing, _)| *existing == key)
    }

    pub fn without(&self, key: char) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(existing, _)| *existing != key)
                .cloned()
                .collect(),
        )
    }

    pub fn legend(&self) -> String {
        self.0
            .iter()
            .map(|(key, label)| format!("<{key}> {label}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ItemRef {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
}

impl ItemRef {
    pub fn label(&self) -> String {
        format!("{} {}", self.kind.noun(), self.name)
    }
}

/// One fetched collection, tagged by kind so it can cross the task boundary.
#[derive(Debug, Clone)]
pub enum Listing {
    Containers(Vec<Container>),
    Images(Vec<Image>),
    Volumes(Vec<Volume>),
    Networks(Vec<Network>),
    Services(Vec<SwarmService>),
    Nodes(Vec<SwarmNode>),
}

impl Listing {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Containers(_) => ResourceKind::Containers,
            Self::Images(_) => ResourceKind::Images,
            Self::Volumes(_) => ResourceKind::Volumes,
            Self::Networks(_) => ResourceKind::Networks,
            Self::Services(_) => ResourceKind::Services,
            Self::Nodes(_) => ResourceKind::Nodes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Containers(items) => items.len(),
            Self::Images(items) => items.len(),
            Self::Volumes(items) => items.len(),
            Self::Networks(items) => items.len(),
            Self::Services(items) => items.len(),
            Self::Nodes(items) => items.len(),
        }
    }
}

pub trait ResourceItem: Clone + Send + 'static {
    const KIND: ResourceKind;

    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn headers() -> &'static [&'static str];
    fn format_row(&self) -> Vec<String>;
    fn from_listing(listing: Listing) -> Option<Vec<Self>>;

    fn item_ref(&self) -> ItemRef {
        ItemRef {
            kind: Self::KIND,
            id: self.id().to_string(),
            name: self.display_name().to_string(),
        }
    }

    fn matches_search(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }

        let query_lower = query.to_lowercase();
        if self.id().to_lowercase().contains(&query_lower)
            || self.display_name().to_lowercase().contains(&query_lower)
        {
            return true;
        }

        self.format_row()
            .iter()
            .any(|cell| cell.to_lowercase().contains(&query_lower))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Container {
    #[serde(rename = "ID")]
    pub id: String,
    pub names: String,
    pub image: String,
    pub status: String,
    pub state: String,
    pub ports: String,
    pub running_for: String,
}

impl ResourceItem for Container {
    const KIND: ResourceKind = ResourceKind::Containers;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        self.names.split(',').next().unwrap_or(&self.names)
    }

    fn headers() -> &'static [&'static str] {
        &["ID", "Name", "Image", "State", "Status", "Ports", "Created"]
    }

    fn format_row(&self) -> Vec<String> {
        vec![
            short_id(&self.id),
            self.display_name().to_string(),
            self.image.clone(),
            self.state.clone(),
            self.status.clone(),
            dash_if_empty(&self.ports),
            self.running_for.clone(),
        ]
    }

    fn from_listing(listing: Listing) -> Option<Vec<Self>> {
        match listing {
            Listing::Containers(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Image {
    #[serde(rename = "ID")]
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub size: String,
    pub created_since: String,
}

impl ResourceItem for Image {
    const KIND: ResourceKind = ResourceKind::Images;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        if self.repository.is_empty() || self.repository == "<none>" {
            &self.id
        } else {
            &self.repository
        }
    }

    fn headers() -> &'static [&'static str] {
        &["ID", "Repository", "Tag", "Size", "Created"]
    }

    fn format_row(&self) -> Vec<String> {
        vec![
            short_id(self.id.trim_start_matches("sha256:")),
            self.repository.clone(),
            self.tag.clone(),
            self.size.clone(),
            self.created_since.clone(),
        ]
    }

    fn from_listing(listing: Listing) -> Option<Vec<Self>> {
        match listing {
            Listing::Images(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Volume {
    pub name: String,
    pub driver: String,
    pub scope: String,
    pub mountpoint: String,
}

impl ResourceItem for Volume {
    const KIND: ResourceKind = ResourceKind::Volumes;

    fn id(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn headers() -> &'static [&'static str] {
        &["Name", "Driver", "Scope", "Mountpoint"]
    }

    fn format_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.driver.clone(),
            self.scope.clone(),
            dash_if_empty(&self.mountpoint),
        ]
    }

    fn from_listing(listing: Listing) -> Option<Vec<Self>> {
        match listing {
            Listing::Volumes(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Network {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
}

impl ResourceItem for Network {
    const KIND: ResourceKind = ResourceKind::Networks;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn headers() -> &'static [&'static str] {
        &["ID", "Name", "Driver", "Scope"]
    }

    fn format_row(&self) -> Vec<String> {
        vec![
            short_id(&self.id),
            self.name.clone(),
            self.driver.clone(),
            self.scope.clone(),
        ]
    }

    fn from_listing(listing: Listing) -> Option<Vec<Self>> {
        match listing {
            Listing::Networks(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwarmService {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub mode: String,
    pub replicas: String,
    pub image: String,
    pub ports: String,
}

impl ResourceItem for SwarmService {
    const KIND: ResourceKind = ResourceKind::Services;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn headers() -> &'static [&'static str] {
        &["ID", "Name", "Mode", "Replicas", "Image", "Ports"]
    }

    fn format_row(&self) -> Vec<String> {
        vec![
            short_id(&self.id),
            self.name.clone(),
            self.mode.clone(),
            self.replicas.clone(),
            self.image.clone(),
            dash_if_empty(&self.ports),
        ]
    }

    fn from_listing(listing: Listing) -> Option<Vec<Self>> {
        match listing {
            Listing::Services(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwarmNode {
    #[serde(rename = "ID")]
    pub id: String,
    pub hostname: String,
    pub status: String,
    pub availability: String,
    pub manager_status: String,
    pub engine_version: String,
}

impl ResourceItem for SwarmNode {
    const KIND: ResourceKind = ResourceKind::Nodes;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.hostname
    }

    fn headers() -> &'static [&'static str] {
        &["ID", "Hostname", "Status", "Availability", "Manager", "Engine"]
    }

    fn format_row(&self) -> Vec<String> {
        vec![
            short_id(self.id.trim_end_matches(" *")),
            self.hostname.clone(),
            self.status.clone(),
            self.availability.clone(),
            dash_if_empty(&self.manager_status),
            self.engine_version.clone(),
        ]
    }

    fn from_listing(listing: Listing) -> Option<Vec<Self>> {
        match listing {
            Listing::Nodes(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct EngineInfo {
    pub server_version: String,
    pub name: String,
    pub containers: u64,
    pub containers_running: u64,
    pub images: u64,
}

impl EngineInfo {
    pub fn summary(&self) -> String {
        format!(
            "docker {} on {}  ctr {}/{}  img {}",
            if self.server_version.is_empty() {
                "?"
            } else {
                &self.server_version
            },
            if self.name.is_empty() { "?" } else { &self.name },
            self.containers_running,
            self.containers,
            self.images
        )
    }
}

/// Values accepted by `docker node update --availability`.
pub const NODE_AVAILABILITIES: [&str; 3] = ["active", "pause", "drain"];

pub fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}

fn dash_if_empty(value: &str) -> String {
    if value.trim().is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}
