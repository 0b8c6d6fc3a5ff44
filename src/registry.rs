use crate::app::{App, AppCommand};
use crate::model::{ActionMap, ResourceKind};
use std::collections::HashMap;

pub type RefreshFn = fn(&mut App) -> AppCommand;

#[derive(Debug, Clone)]
pub struct ViewDescriptor {
    pub name: String,
    pub title: String,
    pub shortcut: char,
    pub handle: ResourceKind,
    pub refresh: Option<RefreshFn>,
    pub actions: ActionMap,
    pub navigation: String,
}

impl ViewDescriptor {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        shortcut: char,
        handle: ResourceKind,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            shortcut,
            handle,
            refresh: None,
            actions: ActionMap::default(),
            navigation: String::new(),
        }
    }

    pub fn with_refresh(mut self, refresh: RefreshFn) -> Self {
        self.refresh = Some(refresh);
        self
    }

    pub fn with_legends(mut self, actions: ActionMap, navigation: impl Into<String>) -> Self {
        self.actions = actions;
        self.navigation = navigation.into();
        self
    }
}

#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: HashMap<String, ViewDescriptor>,
    order: Vec<String>,
    current: Option<String>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ViewDescriptor) {
        if !self.views.contains_key(&descriptor.name) {
            self.order.push(descriptor.name.clone());
        }
        self.views.insert(descriptor.name.clone(), descriptor);
    }

    /// Returns false and leaves the pointer untouched when `name` is unknown.
    pub fn set_current(&mut self, name: &str) -> bool {
        if !self.views.contains_key(name) {
            return false;
        }
        self.current = Some(name.to_string());
        true
    }

    pub fn current(&self) -> Option<&ViewDescriptor> {
        self.current.as_deref().and_then(|name| self.get(name))
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&ViewDescriptor> {
        self.views.get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Serialized action legend of the current view.
    pub fn current_actions(&self) -> String {
        self.current()
            .map(|descriptor| descriptor.actions.legend())
            .unwrap_or_default()
    }

    pub fn current_navigation(&self) -> &str {
        self.current()
            .map(|descriptor| descriptor.navigation.as_str())
            .unwrap_or("")
    }

    pub fn find_by_shortcut(&self, shortcut: char) -> Option<&ViewDescriptor> {
        self.descriptors()
            .find(|descriptor| descriptor.shortcut == shortcut)
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ViewDescriptor> {
        self.order.iter().filter_map(|name| self.views.get(name))
    }
}
