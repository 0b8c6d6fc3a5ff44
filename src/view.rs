use crate::model::{ActionMap, ItemRef, Listing, ResourceItem, ResourceKind};
use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemAction {
    Inspect(ItemRef),
    Remove(ItemRef),
    Start(ItemRef),
    Stop(ItemRef),
    Restart(ItemRef),
    Logs(ItemRef),
    Attach(ItemRef),
    Exec(ItemRef),
    Scale(ItemRef),
    Availability(ItemRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Consumed; carries the action produced by the item handler, if any.
    Handled(Option<ItemAction>),
    Back,
    Ignored(KeyEvent),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ActionContext {
    Detail,
    DetailError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailPanel {
    pub item: ItemRef,
    pub title: String,
    pub body: String,
    pub failed: bool,
    pub actions: ActionMap,
    pub scroll: u16,
}

impl DetailPanel {
    pub fn legend(&self) -> String {
        let mut legend = self.actions.legend();
        if !legend.is_empty() {
            legend.push('\n');
        }
        legend.push_str("<esc> Back");
        legend
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let max = self.body.lines().count().saturating_sub(1).min(u16::MAX as usize) as isize;
        let next = (self.scroll as isize + delta).clamp(0, max.max(0));
        self.scroll = next as u16;
    }
}

pub type ItemHandler<T> = Box<dyn Fn(char, &T) -> Option<ItemAction>>;
pub type DetailsHandler<T> = Box<dyn Fn(&T) -> ItemAction>;

/// Object-safe view over a `ResourceView<T>` so the shell can hold one per kind.
pub trait Panel {
    fn kind(&self) -> ResourceKind;
    fn headers(&self) -> &'static [&'static str];
    fn rows(&self) -> Vec<Vec<String>>;
    fn item_count(&self) -> usize;
    fn selected_row(&self) -> usize;
    fn selected_ref(&self) -> Option<ItemRef>;
    fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome;
    fn handle_detail_key(&self, detail: &DetailPanel, key: KeyEvent) -> KeyOutcome;
    fn navigate(&mut self, key: KeyEvent) -> bool;
    fn apply_listing(&mut self, result: Result<Listing, String>) -> Result<usize, String>;
    fn show_details(&self, item: &ItemRef, payload: Option<&Value>, error: Option<&str>)
    -> DetailPanel;
    fn search(&mut self, term: &str);
    fn clear_search(&mut self);
    fn search_term(&self) -> &str;
    fn actions_for(&self, context: ActionContext) -> ActionMap;
    fn last_refreshed(&self) -> Option<DateTime<Local>>;
}

pub struct ResourceView<T: ResourceItem> {
    all_items: Vec<T>,
    items: Vec<T>,
    selected_row: usize,
    search_term: String,
    actions: ActionMap,
    detail_actions: Option<ActionMap>,
    handler: Option<ItemHandler<T>>,
    on_details: Option<DetailsHandler<T>>,
    last_refreshed: Option<DateTime<Local>>,
}

impl<T: ResourceItem> ResourceView<T> {
    pub fn new(actions: ActionMap) -> Self {
        Self {
            all_items: Vec::new(),
            items: Vec::new(),
            selected_row: 0,
            search_term: String::new(),
            actions,
            detail_actions: None,
            handler: None,
            on_details: None,
            last_refreshed: None,
        }
    }

    pub fn with_handler(mut self, handler: impl Fn(char, &T) -> Option<ItemAction> + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn with_details(mut self, on_details: impl Fn(&T) -> ItemAction + 'static) -> Self {
        self.on_details = Some(Box::new(on_details));
        self
    }

    pub fn with_detail_actions(mut self, actions: ActionMap) -> Self {
        self.detail_actions = Some(actions);
        self
    }

    /// Completes a refresh. Errors leave the displayed items untouched.
    pub fn apply_items(&mut self, result: Result<Vec<T>, String>) -> Result<usize, String> {
        let items = result?;
        let previous = self.selected_item().map(|item| item.id().to_string());
        self.all_items = items;
        self.items = self.filtered();
        self.restore_selection(previous.as_deref());
        self.last_refreshed = Some(Local::now());
        Ok(self.items.len())
    }

    pub fn selected_item(&self) -> Option<&T> {
        if self.selected_row == 0 {
            return None;
        }
        self.items.get(self.selected_row - 1)
    }

    pub fn show_item_details(
        &self,
        item: &T,
        payload: Option<&Value>,
        error: Option<&str>,
    ) -> DetailPanel {
        self.detail_panel(item.item_ref(), payload, error)
    }

    fn detail_panel(&self, item: ItemRef, payload: Option<&Value>, error: Option<&str>) -> DetailPanel {
        if let Some(error) = error {
            return DetailPanel {
                title: format!("Details: {}", item.name),
                body: format!("Failed to inspect {}\n\n{error}", item.name),
                failed: true,
                actions: self.actions_for(ActionContext::DetailError),
                scroll: 0,
                item,
            };
        }

        let body = payload
            .map(|value| {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            })
            .unwrap_or_else(|| "No details available".to_string());
        DetailPanel {
            title: format!("Details: {}", item.name),
            body,
            failed: false,
            actions: self.actions_for(ActionContext::Detail),
            scroll: 0,
            item,
        }
    }

    fn find(&self, id: &str) -> Option<&T> {
        self.all_items.iter().find(|item| item.id() == id)
    }

    fn invoke(&self, key: char, item: &T) -> Option<ItemAction> {
        self.handler.as_ref().and_then(|handler| handler(key, item))
    }

    fn filtered(&self) -> Vec<T> {
        if self.search_term.is_empty() {
            return self.all_items.clone();
        }
        self.all_items
            .iter()
            .filter(|item| item.matches_search(&self.search_term))
            .cloned()
            .collect()
    }

    fn restore_selection(&mut self, previous_id: Option<&str>) {
        if let Some(id) = previous_id
            && let Some(index) = self.items.iter().position(|item| item.id() == id)
        {
            self.selected_row = index + 1;
            return;
        }
        self.selected_row = if self.items.is_empty() { 0 } else { 1 };
    }

    fn move_selection(&mut self, delta: isize) {
        if self.items.is_empty() {
            self.selected_row = 0;
            return;
        }
        let current = self.selected_row.max(1) as isize;
        let next = (current + delta).clamp(1, self.items.len() as isize);
        self.selected_row = next as usize;
    }
}

impl<T: ResourceItem> Panel for ResourceView<T> {
    fn kind(&self) -> ResourceKind {
        T::KIND
    }

    fn headers(&self) -> &'static [&'static str] {
        T::headers()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.items.iter().map(ResourceItem::format_row).collect()
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn selected_row(&self) -> usize {
        self.selected_row
    }

    fn selected_ref(&self) -> Option<ItemRef> {
        self.selected_item().map(ResourceItem::item_ref)
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        match key.code {
            KeyCode::Enter => {
                let action = self
                    .selected_item()
                    .and_then(|item| self.on_details.as_ref().map(|on_details| on_details(item)));
                KeyOutcome::Handled(action)
            }
            KeyCode::Char(c) if !has_command_modifier(key) => {
                let Some(item) = self.selected_item() else {
                    return KeyOutcome::Ignored(key);
                };
                if !self.actions.contains(c) {
                    return KeyOutcome::Ignored(key);
                }
                KeyOutcome::Handled(self.invoke(c, item))
            }
            _ => KeyOutcome::Ignored(key),
        }
    }

    fn handle_detail_key(&self, detail: &DetailPanel, key: KeyEvent) -> KeyOutcome {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => KeyOutcome::Back,
            KeyCode::Char(c) if !has_command_modifier(key) && detail.actions.contains(c) => {
                let action = self
                    .find(&detail.item.id)
                    .and_then(|item| self.invoke(c, item));
                KeyOutcome::Handled(action)
            }
            _ => KeyOutcome::Ignored(key),
        }
    }

    fn navigate(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::PageDown => self.move_selection(10),
            KeyCode::PageUp => self.move_selection(-10),
            KeyCode::Home | KeyCode::Char('g') => self.move_selection(isize::MIN / 2),
            KeyCode::End | KeyCode::Char('G') => self.move_selection(isize::MAX / 2),
            _ => return false,
        }
        true
    }

    fn apply_listing(&mut self, result: Result<Listing, String>) -> Result<usize, String> {
        let items = result.and_then(|listing| {
            let kind = listing.kind();
            T::from_listing(listing)
                .ok_or_else(|| format!("received {kind} listing for {} view", T::KIND.noun()))
        });
        self.apply_items(items)
    }

    fn show_details(
        &self,
        item: &ItemRef,
        payload: Option<&Value>,
        error: Option<&str>,
    ) -> DetailPanel {
        match self.find(&item.id) {
            Some(found) => self.show_item_details(found, payload, error),
            None => self.detail_panel(item.clone(), payload, error),
        }
    }

    fn search(&mut self, term: &str) {
        let previous = self.selected_item().map(|item| item.id().to_string());
        self.search_term = term.trim().to_string();
        self.items = self.filtered();
        self.restore_selection(previous.as_deref());
    }

    fn clear_search(&mut self) {
        self.search("");
    }

    fn search_term(&self) -> &str {
        &self.search_term
    }

    fn actions_for(&self, context: ActionContext) -> ActionMap {
        match context {
            ActionContext::Detail => self
                .detail_actions
                .clone()
                .unwrap_or_else(ActionMap::fallback),
            ActionContext::DetailError => self
                .detail_actions
                .clone()
                .unwrap_or_else(ActionMap::fallback)
                .without('i'),
        }
    }

    fn last_refreshed(&self) -> Option<DateTime<Local>> {
        self.last_refreshed
    }
}

fn has_command_modifier(key: KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) || key.modifiers.contains(KeyModifiers::ALT)
}
