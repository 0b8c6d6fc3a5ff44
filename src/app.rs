use crate::input::{DispatchState, GlobalAction, Mode, Route, edit_line, route};
use crate::logs::{LOGS_LEGEND, LogsOutcome, LogsPanel};
use crate::model::{EngineInfo, ItemRef, Listing, NODE_AVAILABILITIES, ResourceKind};
use crate::panels::Panels;
use crate::registry::ViewRegistry;
use crate::shell_session::{SHELL_LEGEND, ShellOutcome, ShellSession, parse_command_args};
use crate::view::{DetailPanel, ItemAction, KeyOutcome, Panel};
use crossterm::event::{KeyCode, KeyEvent};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

const DETAIL_NAVIGATION: &str = "↑/↓: Scroll\n<backspace> Back";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Remove,
    Start,
    Stop,
    Restart,
    Scale(u64),
    Availability(String),
}

impl Mutation {
    fn progress(&self) -> &'static str {
        match self {
            Self::Remove => "Removing",
            Self::Start => "Starting",
            Self::Stop => "Stopping",
            Self::Restart => "Restarting",
            Self::Scale(_) => "Scaling",
            Self::Availability(_) => "Updating",
        }
    }

    fn done(&self) -> &'static str {
        match self {
            Self::Remove => "Removed",
            Self::Start => "Started",
            Self::Stop => "Stopped",
            Self::Restart => "Restarted",
            Self::Scale(_) => "Scaled",
            Self::Availability(_) => "Updated",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Scale(_) => "scale",
            Self::Availability(_) => "update",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExecOrigin {
    Overlay,
    Shell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    List(ResourceKind),
    Inspect(ItemRef),
    Mutate {
        item: ItemRef,
        mutation: Mutation,
    },
    FetchLogs {
        item: ItemRef,
        tail: usize,
    },
    SaveLogs {
        file_name: String,
        content: String,
    },
    Exec {
        target: ItemRef,
        args: Vec<String>,
        origin: ExecOrigin,
    },
    ReloadConfig,
    ScheduleSearch {
        generation: u64,
    },
}

/// Results handed back to the event loop by backend tasks and timers.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    Listed {
        kind: ResourceKind,
        result: Result<Listing, String>,
    },
    Inspected {
        item: ItemRef,
        result: Result<Value, String>,
    },
    Mutated {
        item: ItemRef,
        mutation: Mutation,
        result: Result<(), String>,
    },
    LogsFetched {
        item: ItemRef,
        result: Result<String, String>,
    },
    LogsSaved(Result<String, String>),
    ExecFinished {
        target: ItemRef,
        origin: ExecOrigin,
        result: Result<String, String>,
    },
    Engine(Result<EngineInfo, String>),
    SearchDue(u64),
}

#[derive(Debug, Clone)]
pub enum SubView {
    Details(DetailPanel),
    Logs(LogsPanel),
    Shell(ShellSession),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Help {
        scroll: u16,
    },
    Error {
        title: String,
        message: String,
    },
    Confirm {
        prompt: String,
        item: ItemRef,
    },
    ExecOutput {
        title: String,
        output: String,
        scroll: u16,
    },
    Scale {
        item: ItemRef,
        input: String,
        error: Option<String>,
    },
    Availability {
        item: ItemRef,
        selected: usize,
    },
}

impl Modal {
    pub fn page_name(&self) -> &'static str {
        match self {
            Self::Help { .. } => "help_modal",
            Self::Error { .. } => "error_modal",
            Self::Confirm { .. } => "confirm_modal",
            Self::ExecOutput { .. } => "exec_output_modal",
            Self::Scale { .. } => "scale_modal",
            Self::Availability { .. } => "availability_modal",
        }
    }
}

enum ModalOutcome {
    Stay,
    Close,
    Submit(AppCommand),
}

pub struct App {
    registry: ViewRegistry,
    panels: Panels,
    mode: Mode,
    subview: Option<SubView>,
    modals: Vec<Modal>,
    shutdown: mpsc::Sender<()>,
    refreshing: Option<ResourceKind>,
    actions_legend: String,
    navigation_legend: String,
    status: String,
    command_input: String,
    command_error: Option<String>,
    search_input: String,
    search_generation: u64,
    exec_input: String,
    exec_target: Option<ItemRef>,
    engine_summary: String,
    log_tail: usize,
}

impl App {
    pub fn new(shutdown: mpsc::Sender<()>, registry: ViewRegistry, log_tail: usize) -> Self {
        let panels = Panels::new(&registry);
        Self {
            registry,
            panels,
            mode: Mode::Normal,
            subview: None,
            modals: Vec::new(),
            shutdown,
            refreshing: None,
            actions_legend: String::new(),
            navigation_legend: String::new(),
            status: "Connecting to docker…".to_string(),
            command_input: String::new(),
            command_error: None,
            search_input: String::new(),
            search_generation: 0,
            exec_input: String::new(),
            exec_target: None,
            engine_summary: "docker: connecting".to_string(),
            log_tail,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn current_kind(&self) -> Option<ResourceKind> {
        self.registry.current().map(|descriptor| descriptor.handle)
    }

    pub fn current_panel(&self) -> Option<&dyn Panel> {
        self.current_kind().map(|kind| self.panels.get(kind))
    }

    pub fn subview(&self) -> Option<&SubView> {
        self.subview.as_ref()
    }

    pub fn in_details(&self) -> bool {
        matches!(self.subview, Some(SubView::Details(_)))
    }

    pub fn in_logs(&self) -> bool {
        matches!(self.subview, Some(SubView::Logs(_)))
    }

    pub fn modals(&self) -> &[Modal] {
        &self.modals
    }

    pub fn has_modal(&self, page_name: &str) -> bool {
        self.modals.iter().any(|modal| modal.page_name() == page_name)
    }

    /// True from the current view's list request until its listing arrives.
    pub fn refreshing(&self) -> bool {
        self.refreshing.is_some()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn actions_legend(&self) -> &str {
        &self.actions_legend
    }

    pub fn navigation_legend(&self) -> &str {
        &self.navigation_legend
    }

    pub fn command_input(&self) -> &str {
        &self.command_input
    }

    pub fn command_error(&self) -> Option<&str> {
        self.command_error.as_deref()
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn exec_input(&self) -> &str {
        &self.exec_input
    }

    pub fn engine_summary(&self) -> &str {
        &self.engine_summary
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
    }

    pub fn set_log_tail(&mut self, log_tail: usize) {
        self.log_tail = log_tail.max(1);
    }

    /// Opens the first view. Unknown names fall back to containers.
    pub fn start(&mut self, view: &str) -> AppCommand {
        let name = self.resolve_view_name(view);
        let command = self.switch_view(&name);
        if self.registry.current().is_some() {
            return command;
        }
        self.switch_view(ResourceKind::Containers.name())
    }

    pub fn switch_view(&mut self, name: &str) -> AppCommand {
        if !self.registry.set_current(name) {
            warn!(view = name, "ignoring switch to unknown view");
            self.set_status(format!("Unknown view: {name}"));
            return AppCommand::None;
        }

        info!(view = name, "switched view");
        self.subview = None;
        self.mode = Mode::Normal;
        self.refreshing = None;
        self.update_legends();
        if let Some(descriptor) = self.registry.current() {
            self.status = descriptor.title.clone();
        }
        self.refresh()
    }

    pub fn show_current_view(&mut self) -> AppCommand {
        self.subview = None;
        self.mode = Mode::Normal;
        self.refreshing = None;
        self.update_legends();
        self.refresh()
    }

    pub fn show_details(&mut self, detail: DetailPanel) {
        self.subview = Some(SubView::Details(detail));
        self.mode = Mode::Normal;
        self.update_legends();
    }

    pub fn show_logs(&mut self, item: ItemRef) -> AppCommand {
        self.subview = Some(SubView::Logs(LogsPanel::new(item.clone())));
        self.mode = Mode::Normal;
        self.update_legends();
        AppCommand::FetchLogs {
            item,
            tail: self.log_tail,
        }
    }

    pub fn show_shell(&mut self, item: ItemRef) {
        info!(container = %item.name, "opening shell session");
        self.subview = Some(SubView::Shell(ShellSession::new(item)));
        self.mode = Mode::ShellActive;
        self.update_legends();
    }

    /// Runs the current view's refresh operation. The reentrancy guard is taken by
    /// `request_list` and released when the listing comes back.
    pub fn refresh(&mut self) -> AppCommand {
        let Some(refresh) = self.registry.current().and_then(|descriptor| descriptor.refresh)
        else {
            return AppCommand::None;
        };
        refresh(self)
    }

    pub fn request_list(&mut self, kind: ResourceKind) -> AppCommand {
        debug!(view = kind.name(), "requesting listing");
        if self.current_kind() == Some(kind) {
            self.refreshing = Some(kind);
        }
        AppCommand::List(kind)
    }

    /// Periodic refresh. Suspended while a modal or a static sub-view is showing.
    pub fn tick(&mut self) -> AppCommand {
        if !self.modals.is_empty() {
            return AppCommand::None;
        }
        match &mut self.subview {
            Some(SubView::Logs(logs)) if logs.follow() => {
                logs.begin_fetch();
                AppCommand::FetchLogs {
                    item: logs.item().clone(),
                    tail: self.log_tail,
                }
            }
            Some(_) => AppCommand::None,
            None => self.refresh(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppCommand {
        match route(self.dispatch_state(), key) {
            Route::Modal(key) => self.handle_modal_key(key),
            Route::Shell(key) => self.handle_shell_key(key),
            Route::CommandInput(key) => self.handle_command_key(key),
            Route::ExitCommand => {
                self.mode = Mode::Normal;
                self.command_input.clear();
                self.command_error = None;
                AppCommand::None
            }
            Route::SearchInput { key, refilter } => {
                edit_line(&mut self.search_input, key);
                if !refilter {
                    return AppCommand::None;
                }
                self.search_generation += 1;
                AppCommand::ScheduleSearch {
                    generation: self.search_generation,
                }
            }
            Route::CommitSearch => {
                self.search_generation += 1;
                self.mode = Mode::Normal;
                let term = self.search_input.trim().to_string();
                self.apply_search(&term);
                if term.is_empty() {
                    self.set_status("Filter cleared");
                } else {
                    self.set_status(format!("Filter: {term}"));
                }
                AppCommand::None
            }
            Route::CancelSearch => {
                self.search_generation += 1;
                self.mode = Mode::Normal;
                self.search_input.clear();
                if let Some(kind) = self.current_kind() {
                    self.panels.get_mut(kind).clear_search();
                }
                self.set_status("Filter cleared");
                AppCommand::None
            }
            Route::ExecInput(key) => self.handle_exec_key(key),
            Route::CloseExec => {
                self.mode = Mode::Normal;
                self.exec_input.clear();
                self.exec_target = None;
                AppCommand::None
            }
            Route::Panel(key) => self.handle_panel_key(key),
            Route::Global(action) => self.handle_global(action),
        }
    }

    pub fn apply_event(&mut self, event: LoopEvent) -> AppCommand {
        match event {
            LoopEvent::Listed { kind, result } => {
                self.apply_listing(kind, result);
                AppCommand::None
            }
            LoopEvent::Inspected { item, result } => {
                let busy = self.mode != Mode::Normal
                    || matches!(self.subview, Some(SubView::Logs(_) | SubView::Shell(_)));
                if busy || self.current_kind() != Some(item.kind) {
                    debug!(item = %item.label(), mode = ?self.mode, "dropping stale inspect result");
                    return AppCommand::None;
                }
                let panel = self.panels.get(item.kind);
                let detail = match &result {
                    Ok(payload) => panel.show_details(&item, Some(payload), None),
                    Err(error) => {
                        warn!(item = %item.label(), error = %error, "inspect failed");
                        panel.show_details(&item, None, Some(error))
                    }
                };
                self.show_details(detail);
                self.set_status(format!("Details for {}", item.label()));
                AppCommand::None
            }
            LoopEvent::Mutated {
                item,
                mutation,
                result,
            } => self.apply_mutation(item, mutation, result),
            LoopEvent::LogsFetched { item, result } => {
                match &mut self.subview {
                    Some(SubView::Logs(logs)) if logs.item().id == item.id => logs.apply(result),
                    _ => debug!(item = %item.label(), "dropping logs for closed view"),
                }
                AppCommand::None
            }
            LoopEvent::LogsSaved(result) => {
                match result {
                    Ok(path) => self.set_status(format!("Logs saved to {path}")),
                    Err(error) => self.show_error("Failed to save logs", error),
                }
                AppCommand::None
            }
            LoopEvent::ExecFinished {
                target,
                origin,
                result,
            } => {
                self.apply_exec_result(target, origin, result);
                AppCommand::None
            }
            LoopEvent::Engine(result) => {
                match result {
                    Ok(info) => self.engine_summary = info.summary(),
                    Err(error) => {
                        debug!(error = %error, "engine info unavailable");
                        self.engine_summary = "docker: unreachable".to_string();
                    }
                }
                AppCommand::None
            }
            LoopEvent::SearchDue(generation) => {
                if generation == self.search_generation && self.mode == Mode::SearchEntry {
                    let term = self.search_input.clone();
                    self.apply_search(&term);
                }
                AppCommand::None
            }
        }
    }

    pub fn show_error(&mut self, title: impl Into<String>, message: impl Into<String>) {
        let title = title.into();
        let message = message.into();
        warn!(title = %title, error = %message, "showing error");
        self.set_status(format!("{title}: {}", summarize_error_line(&message)));
        self.modals.push(Modal::Error { title, message });
    }

    fn dispatch_state(&self) -> DispatchState {
        DispatchState {
            modal_active: !self.modals.is_empty(),
            mode: self.mode,
            in_details: self.in_details(),
            in_logs: self.in_logs(),
        }
    }

    fn handle_global(&mut self, action: GlobalAction) -> AppCommand {
        match action {
            GlobalAction::Shutdown => {
                self.request_shutdown();
                AppCommand::None
            }
            GlobalAction::EnterCommand => {
                self.mode = Mode::CommandEntry;
                self.command_input.clear();
                self.command_error = None;
                AppCommand::None
            }
            GlobalAction::EnterSearch => {
                self.mode = Mode::SearchEntry;
                self.search_input = self
                    .current_panel()
                    .map(|panel| panel.search_term().to_string())
                    .unwrap_or_default();
                AppCommand::None
            }
            GlobalAction::Back => self.show_current_view(),
            GlobalAction::Discard => AppCommand::None,
        }
    }

    fn request_shutdown(&mut self) {
        match self.shutdown.try_send(()) {
            Ok(()) => {
                info!("shutdown requested");
                self.set_status("Shutting down…");
            }
            Err(TrySendError::Full(())) => debug!("shutdown already pending"),
            Err(TrySendError::Closed(())) => debug!("shutdown receiver already gone"),
        }
    }

    fn handle_panel_key(&mut self, key: KeyEvent) -> AppCommand {
        match &mut self.subview {
            Some(SubView::Details(detail)) => {
                let outcome = self.panels.get(detail.item.kind).handle_detail_key(detail, key);
                match outcome {
                    KeyOutcome::Back => self.show_current_view(),
                    KeyOutcome::Handled(Some(action)) => self.perform(action),
                    KeyOutcome::Handled(None) => AppCommand::None,
                    KeyOutcome::Ignored(key) => {
                        match key.code {
                            KeyCode::Down | KeyCode::Char('j') => detail.scroll_by(1),
                            KeyCode::Up | KeyCode::Char('k') => detail.scroll_by(-1),
                            KeyCode::PageDown => detail.scroll_by(20),
                            KeyCode::PageUp => detail.scroll_by(-20),
                            _ => {}
                        }
                        AppCommand::None
                    }
                }
            }
            Some(SubView::Logs(logs)) => match logs.handle_key(key) {
                LogsOutcome::Back => self.show_current_view(),
                LogsOutcome::Refetch => {
                    logs.begin_fetch();
                    AppCommand::FetchLogs {
                        item: logs.item().clone(),
                        tail: self.log_tail,
                    }
                }
                LogsOutcome::Save { file_name, content } => {
                    AppCommand::SaveLogs { file_name, content }
                }
                LogsOutcome::Consumed => AppCommand::None,
            },
            Some(SubView::Shell(_)) => {
                self.mode = Mode::ShellActive;
                AppCommand::None
            }
            None => {
                let Some(kind) = self.current_kind() else {
                    return AppCommand::None;
                };
                let panel = self.panels.get_mut(kind);
                match panel.handle_key(key) {
                    KeyOutcome::Handled(Some(action)) => self.perform(action),
                    KeyOutcome::Handled(None) | KeyOutcome::Back => AppCommand::None,
                    KeyOutcome::Ignored(key) => {
                        panel.navigate(key);
                        AppCommand::None
                    }
                }
            }
        }
    }

    fn perform(&mut self, action: ItemAction) -> AppCommand {
        debug!(action = ?action, "item action");
        match action {
            ItemAction::Inspect(item) => {
                self.set_status(format!("Inspecting {}…", item.label()));
                AppCommand::Inspect(item)
            }
            ItemAction::Remove(item) => {
                self.modals.push(Modal::Confirm {
                    prompt: format!("Delete {}?", item.label()),
                    item,
                });
                AppCommand::None
            }
            ItemAction::Start(item) => self.mutate(item, Mutation::Start),
            ItemAction::Stop(item) => self.mutate(item, Mutation::Stop),
            ItemAction::Restart(item) => self.mutate(item, Mutation::Restart),
            ItemAction::Logs(item) => self.show_logs(item),
            ItemAction::Attach(item) => {
                self.show_shell(item);
                AppCommand::None
            }
            ItemAction::Exec(item) => {
                self.mode = Mode::ExecInput;
                self.exec_input.clear();
                self.exec_target = Some(item);
                AppCommand::None
            }
            ItemAction::Scale(item) => {
                self.modals.push(Modal::Scale {
                    item,
                    input: String::new(),
                    error: None,
                });
                AppCommand::None
            }
            ItemAction::Availability(item) => {
                self.modals.push(Modal::Availability { item, selected: 0 });
                AppCommand::None
            }
        }
    }

    fn mutate(&mut self, item: ItemRef, mutation: Mutation) -> AppCommand {
        self.set_status(format!("{} {}…", mutation.progress(), item.label()));
        AppCommand::Mutate { item, mutation }
    }

    fn apply_mutation(
        &mut self,
        item: ItemRef,
        mutation: Mutation,
        result: Result<(), String>,
    ) -> AppCommand {
        if let Err(error) = result {
            self.show_error(format!("Failed to {} {}", mutation.verb(), item.label()), error);
            return AppCommand::None;
        }

        info!(item = %item.label(), action = mutation.verb(), "mutation finished");
        self.set_status(format!("{} {}", mutation.done(), item.label()));
        if self.current_kind() != Some(item.kind) {
            return AppCommand::None;
        }

        let showing_removed = mutation == Mutation::Remove
            && matches!(&self.subview, Some(SubView::Details(detail)) if detail.item.id == item.id);
        if showing_removed {
            return self.show_current_view();
        }
        if self.subview.is_none() {
            return self.refresh();
        }
        AppCommand::None
    }

    fn apply_listing(&mut self, kind: ResourceKind, result: Result<Listing, String>) {
        let outcome = self.panels.get_mut(kind).apply_listing(result);
        if self.refreshing == Some(kind) {
            self.refreshing = None;
            self.update_legends();
        }

        let is_current = self.current_kind() == Some(kind);
        match outcome {
            Ok(count) if is_current => {
                debug!(view = kind.name(), count, "listing applied");
                if self.subview.is_none() && self.modals.is_empty() {
                    self.set_status(format!("{}: {count} items", kind.title()));
                }
                self.update_legends();
            }
            Ok(_) => {}
            Err(error) if is_current => {
                self.show_error(format!("Failed to refresh {}", kind.title()), error);
            }
            Err(error) => debug!(view = kind.name(), error = %error, "background refresh failed"),
        }
    }

    fn apply_search(&mut self, term: &str) {
        if let Some(kind) = self.current_kind() {
            self.panels.get_mut(kind).search(term);
        }
    }

    fn apply_exec_result(
        &mut self,
        target: ItemRef,
        origin: ExecOrigin,
        result: Result<String, String>,
    ) {
        match origin {
            ExecOrigin::Shell => match &mut self.subview {
                Some(SubView::Shell(session)) if session.target().id == target.id => {
                    session.finish(result)
                }
                _ => debug!(target = %target.label(), "dropping output for closed shell"),
            },
            ExecOrigin::Overlay => match result {
                Ok(output) => {
                    self.set_status(format!("Exec finished in {}", target.label()));
                    self.modals.push(Modal::ExecOutput {
                        title: format!("Exec: {}", target.name),
                        output: if output.trim().is_empty() {
                            "(no output)".to_string()
                        } else {
                            output
                        },
                        scroll: 0,
                    });
                }
                Err(error) => {
                    self.show_error(format!("Exec failed in {}", target.label()), error)
                }
            },
        }
    }

    fn handle_command_key(&mut self, key: KeyEvent) -> AppCommand {
        if key.code == KeyCode::Enter {
            let line = self.command_input.trim().to_string();
            return self.execute_command_line(&line);
        }
        if edit_line(&mut self.command_input, key) {
            self.command_error = None;
        }
        AppCommand::None
    }

    fn execute_command_line(&mut self, line: &str) -> AppCommand {
        if line.is_empty() {
            return AppCommand::None;
        }

        let token = line.trim_start_matches(':').to_ascii_lowercase();
        match token.as_str() {
            "q" | "quit" | "exit" | "q!" => {
                self.leave_command_mode();
                self.request_shutdown();
                return AppCommand::None;
            }
            "r" | "reload" => {
                self.leave_command_mode();
                self.set_status("Reloading config…");
                return AppCommand::ReloadConfig;
            }
            "?" | "h" | "help" => {
                self.leave_command_mode();
                if !self.has_modal("help_modal") {
                    self.modals.push(Modal::Help { scroll: 0 });
                }
                return AppCommand::None;
            }
            _ => {}
        }

        let view = self.resolve_view_name(line);
        if self.registry.exists(&view) {
            self.leave_command_mode();
            return self.switch_view(&view);
        }

        debug!(command = line, "rejected command");
        self.command_error = Some(format!("Wrong command: {line}"));
        AppCommand::None
    }

    fn leave_command_mode(&mut self) {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.command_error = None;
    }

    fn handle_exec_key(&mut self, key: KeyEvent) -> AppCommand {
        if key.code != KeyCode::Enter {
            edit_line(&mut self.exec_input, key);
            return AppCommand::None;
        }

        let args = parse_command_args(&self.exec_input);
        if args.is_empty() {
            return AppCommand::None;
        }
        self.mode = Mode::Normal;
        self.exec_input.clear();
        let Some(target) = self.exec_target.take() else {
            return AppCommand::None;
        };
        self.set_status(format!("Running {} in {}…", args.join(" "), target.label()));
        AppCommand::Exec {
            target,
            args,
            origin: ExecOrigin::Overlay,
        }
    }

    fn handle_shell_key(&mut self, key: KeyEvent) -> AppCommand {
        let Some(SubView::Shell(session)) = &mut self.subview else {
            self.mode = Mode::Normal;
            return AppCommand::None;
        };
        match session.handle_key(key) {
            ShellOutcome::Consumed => AppCommand::None,
            ShellOutcome::Exit => {
                info!(container = %session.target().name, "closing shell session");
                self.show_current_view()
            }
            ShellOutcome::Run(args) => AppCommand::Exec {
                target: session.target().clone(),
                args,
                origin: ExecOrigin::Shell,
            },
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) -> AppCommand {
        let Some(modal) = self.modals.last_mut() else {
            return AppCommand::None;
        };

        let outcome = match modal {
            Modal::Help { scroll } => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('?') => {
                    ModalOutcome::Close
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    *scroll = scroll.saturating_add(1);
                    ModalOutcome::Stay
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    *scroll = scroll.saturating_sub(1);
                    ModalOutcome::Stay
                }
                _ => ModalOutcome::Stay,
            },
            Modal::Error { .. } => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => ModalOutcome::Close,
                _ => ModalOutcome::Stay,
            },
            Modal::ExecOutput { output, scroll, .. } => {
                let max = output.lines().count().saturating_sub(1).min(u16::MAX as usize) as u16;
                match key.code {
                    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => ModalOutcome::Close,
                    KeyCode::Down | KeyCode::Char('j') => {
                        *scroll = scroll.saturating_add(1).min(max);
                        ModalOutcome::Stay
                    }
                    KeyCode::Up | KeyCode::Char('k') => {
                        *scroll = scroll.saturating_sub(1);
                        ModalOutcome::Stay
                    }
                    KeyCode::PageDown => {
                        *scroll = scroll.saturating_add(20).min(max);
                        ModalOutcome::Stay
                    }
                    KeyCode::PageUp => {
                        *scroll = scroll.saturating_sub(20);
                        ModalOutcome::Stay
                    }
                    _ => ModalOutcome::Stay,
                }
            }
            Modal::Confirm { item, .. } => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    ModalOutcome::Submit(AppCommand::Mutate {
                        item: item.clone(),
                        mutation: Mutation::Remove,
                    })
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ModalOutcome::Close,
                _ => ModalOutcome::Stay,
            },
            Modal::Scale { item, input, error } => match key.code {
                KeyCode::Esc => ModalOutcome::Close,
                KeyCode::Enter => match input.trim().parse::<u64>() {
                    Ok(replicas) => ModalOutcome::Submit(AppCommand::Mutate {
                        item: item.clone(),
                        mutation: Mutation::Scale(replicas),
                    }),
                    Err(_) => {
                        *error = Some("Replicas must be a non-negative number".to_string());
                        ModalOutcome::Stay
                    }
                },
                KeyCode::Char(c) if !c.is_ascii_digit() => ModalOutcome::Stay,
                _ => {
                    if edit_line(input, key) {
                        *error = None;
                    }
                    ModalOutcome::Stay
                }
            },
            Modal::Availability { item, selected } => match key.code {
                KeyCode::Esc => ModalOutcome::Close,
                KeyCode::Down | KeyCode::Right | KeyCode::Tab | KeyCode::Char('j') => {
                    *selected = (*selected + 1) % NODE_AVAILABILITIES.len();
                    ModalOutcome::Stay
                }
                KeyCode::Up | KeyCode::Left | KeyCode::BackTab | KeyCode::Char('k') => {
                    *selected =
                        (*selected + NODE_AVAILABILITIES.len() - 1) % NODE_AVAILABILITIES.len();
                    ModalOutcome::Stay
                }
                KeyCode::Enter => ModalOutcome::Submit(AppCommand::Mutate {
                    item: item.clone(),
                    mutation: Mutation::Availability(
                        NODE_AVAILABILITIES[*selected % NODE_AVAILABILITIES.len()].to_string(),
                    ),
                }),
                _ => ModalOutcome::Stay,
            },
        };

        match outcome {
            ModalOutcome::Stay => AppCommand::None,
            ModalOutcome::Close => {
                self.modals.pop();
                AppCommand::None
            }
            ModalOutcome::Submit(command) => {
                self.modals.pop();
                if let AppCommand::Mutate { item, mutation } = command {
                    return self.mutate(item, mutation);
                }
                command
            }
        }
    }

    /// Maps an alias (`ctr`, `svc`) or a view shortcut (`w`) to its registry key.
    /// Anything else is returned trimmed.
    fn resolve_view_name(&self, token: &str) -> String {
        let token = token.trim();
        if let Some(kind) =
            ResourceKind::from_token(token).or_else(|| ResourceKind::from_name(token))
        {
            return kind.name().to_string();
        }
        let mut chars = token.chars();
        if let (Some(shortcut), None) = (chars.next(), chars.next())
            && let Some(descriptor) = self.registry.find_by_shortcut(shortcut)
        {
            return descriptor.name.clone();
        }
        token.to_string()
    }

    fn update_legends(&mut self) {
        if self.refreshing.is_some() {
            return;
        }
        let (actions, navigation) = match &self.subview {
            Some(SubView::Details(detail)) => (detail.legend(), DETAIL_NAVIGATION.to_string()),
            Some(SubView::Logs(_)) => (LOGS_LEGEND.to_string(), String::new()),
            Some(SubView::Shell(_)) => (SHELL_LEGEND.to_string(), String::new()),
            None => (
                self.registry.current_actions(),
                self.registry.current_navigation().to_string(),
            ),
        };
        self.actions_legend = actions;
        self.navigation_legend = navigation;
    }
}

fn summarize_error_line(error: &str) -> String {
    error
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

fn normalize_status_text(status: String) -> String {
    const MAX_STATUS_LEN: usize = 180;
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, ExecOrigin, LoopEvent, Modal, Mutation, SubView};
    use crate::docker::{DockerCli, ServiceSet};
    use crate::input::Mode;
    use crate::model::{Container, Image, ItemRef, Listing, ResourceKind};
    use crate::panels::build_registry;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn new_app(tx: mpsc::Sender<()>) -> App {
        App::new(tx, build_registry(&ServiceSet::docker(DockerCli::new(None))), 200)
    }

    fn app() -> (App, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        let mut app = new_app(tx);
        app.start("containers");
        (app, rx)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut App, c: char) -> AppCommand {
        app.handle_key(key(KeyCode::Char(c)))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, c);
        }
    }

    fn container(id: &str, name: &str) -> Container {
        Container {
            id: id.to_string(),
            names: name.to_string(),
            image: "nginx".to_string(),
            state: "running".to_string(),
            ..Container::default()
        }
    }

    fn web_ref() -> ItemRef {
        ItemRef {
            kind: ResourceKind::Containers,
            id: "c1".to_string(),
            name: "web".to_string(),
        }
    }

    fn load_containers(app: &mut App) {
        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Containers,
            result: Ok(Listing::Containers(vec![
                container("c1", "web"),
                container("c2", "db"),
            ])),
        });
    }

    fn open_details(app: &mut App) {
        app.apply_event(LoopEvent::Inspected {
            item: web_ref(),
            result: Ok(json!({"Id": "c1"})),
        });
    }

    #[test]
    fn start_requests_first_listing() {
        let (tx, _rx) = mpsc::channel(1);
        let mut app = new_app(tx);
        assert_eq!(app.start("ctr"), AppCommand::List(ResourceKind::Containers));
        assert_eq!(app.registry().current_name(), Some("containers"));
        assert!(app.actions_legend().contains("<s> Start"));
    }

    #[test]
    fn unknown_start_view_falls_back_to_containers() {
        let (tx, _rx) = mpsc::channel(1);
        let mut app = new_app(tx);
        assert_eq!(app.start("pods"), AppCommand::List(ResourceKind::Containers));
        assert_eq!(app.current_kind(), Some(ResourceKind::Containers));
    }

    #[test]
    fn q_sends_exactly_one_shutdown_signal() {
        let (mut app, mut rx) = app();
        press(&mut app, 'q');
        press(&mut app, 'Q');
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn ctrl_c_requests_shutdown() {
        let (mut app, mut rx) = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn backspace_from_details_returns_to_table_and_refreshes() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        open_details(&mut app);
        assert!(app.in_details());

        let command = app.handle_key(key(KeyCode::Backspace));
        assert!(!app.in_details());
        assert_eq!(command, AppCommand::List(ResourceKind::Containers));
        assert!(app.actions_legend().contains("<s> Start"));
    }

    #[test]
    fn backspace_in_table_does_nothing() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        let legend = app.actions_legend().to_string();
        assert_eq!(app.handle_key(key(KeyCode::Backspace)), AppCommand::None);
        assert!(app.subview().is_none());
        assert_eq!(app.actions_legend(), legend);
    }

    #[test]
    fn failed_refresh_keeps_items_and_shows_one_error() {
        let (mut app, _rx) = app();
        load_containers(&mut app);

        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Containers,
            result: Err("Cannot connect to the Docker daemon".to_string()),
        });

        assert_eq!(app.current_panel().map(|panel| panel.item_count()), Some(2));
        let errors = app
            .modals()
            .iter()
            .filter(|modal| modal.page_name() == "error_modal")
            .count();
        assert_eq!(errors, 1);
        assert!(!app.refreshing());
    }

    #[test]
    fn refresh_guard_is_cleared_without_current_view() {
        let (tx, _rx) = mpsc::channel(1);
        let mut app = new_app(tx);
        assert_eq!(app.refresh(), AppCommand::None);
        assert!(!app.refreshing());
    }

    #[test]
    fn unknown_view_leaves_state_untouched() {
        let (mut app, _rx) = app();
        assert_eq!(app.switch_view("pods"), AppCommand::None);
        assert_eq!(app.registry().current_name(), Some("containers"));
        assert!(app.status().contains("Unknown view"));
    }

    #[test]
    fn command_mode_switches_view_by_alias() {
        let (mut app, _rx) = app();
        press(&mut app, ':');
        assert_eq!(app.mode(), Mode::CommandEntry);
        type_text(&mut app, "img");
        let command = app.handle_key(key(KeyCode::Enter));
        assert_eq!(command, AppCommand::List(ResourceKind::Images));
        assert_eq!(app.mode(), Mode::Normal);
        assert_eq!(app.registry().current_name(), Some("images"));
    }

    #[test]
    fn wrong_command_stays_in_command_mode_until_edited() {
        let (mut app, _rx) = app();
        press(&mut app, ':');
        type_text(&mut app, "pods");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.mode(), Mode::CommandEntry);
        assert_eq!(app.command_error(), Some("Wrong command: pods"));

        app.handle_key(key(KeyCode::Backspace));
        assert!(app.command_error().is_none());
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.mode(), Mode::Normal);
    }

    #[test]
    fn q_inside_command_mode_is_text() {
        let (mut app, mut rx) = app();
        press(&mut app, ':');
        press(&mut app, 'q');
        assert!(rx.try_recv().is_err());
        assert_eq!(app.command_input(), "q");
        app.handle_key(key(KeyCode::Enter));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn command_mode_reload_and_help() {
        let (mut app, _rx) = app();
        press(&mut app, ':');
        type_text(&mut app, "reload");
        assert_eq!(app.handle_key(key(KeyCode::Enter)), AppCommand::ReloadConfig);

        press(&mut app, ':');
        type_text(&mut app, "help");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.has_modal("help_modal"));
        app.handle_key(key(KeyCode::Esc));
        assert!(app.modals().is_empty());
    }

    #[test]
    fn only_latest_search_generation_applies() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        press(&mut app, '/');
        assert_eq!(app.mode(), Mode::SearchEntry);

        let first = press(&mut app, 'w');
        let second = press(&mut app, 'e');
        assert_eq!(first, AppCommand::ScheduleSearch { generation: 1 });
        assert_eq!(second, AppCommand::ScheduleSearch { generation: 2 });

        app.apply_event(LoopEvent::SearchDue(1));
        assert_eq!(app.current_panel().map(|panel| panel.item_count()), Some(2));

        app.apply_event(LoopEvent::SearchDue(2));
        assert_eq!(app.current_panel().map(|panel| panel.item_count()), Some(1));
    }

    #[test]
    fn search_commit_keeps_filter_and_escape_clears() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        press(&mut app, '/');
        type_text(&mut app, "db");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.mode(), Mode::Normal);
        assert_eq!(app.current_panel().map(|panel| panel.item_count()), Some(1));

        press(&mut app, '/');
        assert_eq!(app.search_input(), "db");
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.current_panel().map(|panel| panel.item_count()), Some(2));
        assert_eq!(app.current_panel().map(|panel| panel.search_term()), Some(""));
    }

    #[test]
    fn remove_requires_confirmation() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        assert_eq!(press(&mut app, 'd'), AppCommand::None);
        assert!(matches!(
            app.modals().last(),
            Some(Modal::Confirm { prompt, .. }) if prompt == "Delete container web?"
        ));

        assert_eq!(
            press(&mut app, 'y'),
            AppCommand::Mutate {
                item: web_ref(),
                mutation: Mutation::Remove
            }
        );
        assert!(app.modals().is_empty());
    }

    #[test]
    fn modal_swallows_global_keys() {
        let (mut app, mut rx) = app();
        load_containers(&mut app);
        press(&mut app, 'd');
        press(&mut app, 'q');
        assert!(rx.try_recv().is_err());
        assert!(app.has_modal("confirm_modal"));
        app.handle_key(key(KeyCode::Esc));
        assert!(app.modals().is_empty());
    }

    #[test]
    fn successful_mutation_refreshes_current_view() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        let command = app.apply_event(LoopEvent::Mutated {
            item: web_ref(),
            mutation: Mutation::Stop,
            result: Ok(()),
        });
        assert_eq!(command, AppCommand::List(ResourceKind::Containers));
        assert_eq!(app.status(), "Stopped container web");
    }

    #[test]
    fn failed_mutation_opens_error_modal() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        let command = app.apply_event(LoopEvent::Mutated {
            item: web_ref(),
            mutation: Mutation::Start,
            result: Err("permission denied".to_string()),
        });
        assert_eq!(command, AppCommand::None);
        assert!(matches!(
            app.modals().last(),
            Some(Modal::Error { title, .. }) if title == "Failed to start container web"
        ));
    }

    #[test]
    fn failed_inspect_shows_inline_error_panel() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        app.apply_event(LoopEvent::Inspected {
            item: web_ref(),
            result: Err("no such container".to_string()),
        });
        match app.subview() {
            Some(SubView::Details(detail)) => {
                assert!(detail.failed);
                assert!(detail.body.contains("no such container"));
            }
            other => panic!("expected details, got {other:?}"),
        }
        assert!(app.modals().is_empty());
        assert!(!app.actions_legend().contains("<i>"));
    }

    #[test]
    fn enter_on_row_requests_inspect() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        assert_eq!(
            app.handle_key(key(KeyCode::Enter)),
            AppCommand::Inspect(web_ref())
        );
    }

    #[test]
    fn exec_overlay_runs_through_shell_when_piped() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        press(&mut app, 'e');
        assert_eq!(app.mode(), Mode::ExecInput);
        type_text(&mut app, "ps | wc");
        let command = app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            command,
            AppCommand::Exec {
                target: web_ref(),
                args: vec!["/bin/sh".to_string(), "-c".to_string(), "ps | wc".to_string()],
                origin: ExecOrigin::Overlay,
            }
        );
        assert_eq!(app.mode(), Mode::Normal);

        app.apply_event(LoopEvent::ExecFinished {
            target: web_ref(),
            origin: ExecOrigin::Overlay,
            result: Ok("3\n".to_string()),
        });
        assert!(app.has_modal("exec_output_modal"));
    }

    #[test]
    fn exec_overlay_escape_closes_without_running() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        press(&mut app, 'e');
        type_text(&mut app, "ls");
        assert_eq!(app.handle_key(key(KeyCode::Esc)), AppCommand::None);
        assert_eq!(app.mode(), Mode::Normal);
        assert_eq!(app.exec_input(), "");
    }

    #[test]
    fn shell_session_owns_every_key() {
        let (mut app, mut rx) = app();
        load_containers(&mut app);
        press(&mut app, 'a');
        assert_eq!(app.mode(), Mode::ShellActive);

        press(&mut app, 'q');
        assert!(rx.try_recv().is_err());
        app.handle_key(key(KeyCode::Backspace));
        assert!(matches!(app.subview(), Some(SubView::Shell(_))));

        type_text(&mut app, "ls");
        let command = app.handle_key(key(KeyCode::Enter));
        assert!(matches!(
            command,
            AppCommand::Exec { origin: ExecOrigin::Shell, .. }
        ));

        let command = app.handle_key(key(KeyCode::Esc));
        assert_eq!(command, AppCommand::List(ResourceKind::Containers));
        assert_eq!(app.mode(), Mode::Normal);
        assert!(app.subview().is_none());
    }

    #[test]
    fn logs_view_fetches_and_follows_on_tick() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        let command = press(&mut app, 'l');
        assert_eq!(
            command,
            AppCommand::FetchLogs {
                item: web_ref(),
                tail: 200
            }
        );
        assert!(app.in_logs());
        assert_eq!(app.tick(), AppCommand::None);

        press(&mut app, 'f');
        assert!(matches!(app.tick(), AppCommand::FetchLogs { .. }));

        app.handle_key(key(KeyCode::Backspace));
        assert!(!app.in_logs());
    }

    #[test]
    fn scale_modal_rejects_letters_and_submits_number() {
        let (mut app, _rx) = app();
        app.switch_view("swarmServices");
        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Services,
            result: Ok(Listing::Services(vec![crate::model::SwarmService {
                id: "s1".to_string(),
                name: "api".to_string(),
                ..Default::default()
            }])),
        });
        press(&mut app, 's');
        assert!(app.has_modal("scale_modal"));
        type_text(&mut app, "x3");
        let command = app.handle_key(key(KeyCode::Enter));
        assert!(matches!(
            command,
            AppCommand::Mutate { mutation: Mutation::Scale(3), .. }
        ));
    }

    #[test]
    fn stale_listing_for_other_view_is_quiet() {
        let (mut app, _rx) = app();
        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Images,
            result: Err("timed out".to_string()),
        });
        assert!(app.modals().is_empty());

        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Images,
            result: Ok(Listing::Images(vec![Image::default()])),
        });
        app.switch_view("images");
        assert_eq!(app.current_panel().map(|panel| panel.item_count()), Some(1));
    }

    #[test]
    fn legend_repaint_waits_for_pending_listing() {
        let (mut app, _rx) = app();
        assert!(app.refreshing());
        let table_legend = app.actions_legend().to_string();

        open_details(&mut app);
        assert!(app.in_details());
        assert_eq!(app.actions_legend(), table_legend);

        load_containers(&mut app);
        assert!(!app.refreshing());
        let detail_legend = match app.subview() {
            Some(SubView::Details(detail)) => detail.legend(),
            other => panic!("expected details, got {other:?}"),
        };
        assert_eq!(app.actions_legend(), detail_legend);
    }

    #[test]
    fn failed_listing_releases_refresh_guard() {
        let (mut app, _rx) = app();
        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Images,
            result: Ok(Listing::Images(Vec::new())),
        });
        assert!(app.refreshing());

        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Containers,
            result: Err("Cannot connect to the Docker daemon".to_string()),
        });
        assert!(!app.refreshing());
        assert!(app.has_modal("error_modal"));
    }

    #[test]
    fn switching_view_moves_refresh_guard_to_new_view() {
        let (mut app, _rx) = app();
        app.switch_view("images");
        assert!(app.actions_legend().contains("<r> Remove"));

        load_containers(&mut app);
        assert!(app.refreshing());
        app.apply_event(LoopEvent::Listed {
            kind: ResourceKind::Images,
            result: Ok(Listing::Images(Vec::new())),
        });
        assert!(!app.refreshing());
    }

    #[test]
    fn late_inspect_does_not_interrupt_command_entry() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        press(&mut app, ':');
        type_text(&mut app, "im");

        open_details(&mut app);
        assert_eq!(app.mode(), Mode::CommandEntry);
        assert_eq!(app.command_input(), "im");
        assert!(!app.in_details());
    }

    #[test]
    fn late_inspect_keeps_logs_view() {
        let (mut app, _rx) = app();
        load_containers(&mut app);
        app.show_logs(web_ref());

        open_details(&mut app);
        assert!(app.in_logs());
    }
}
