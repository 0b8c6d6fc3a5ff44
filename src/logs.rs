use crate::model::ItemRef;
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};

pub const LOGS_LEGEND: &str =
    "<f> Follow\n<t> Tail\n<s> Save\n<c> Clear\n<w> Wrap\n↑/↓: Scroll\n<esc> Back";

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LogsOutcome {
    Consumed,
    Back,
    Refetch,
    Save { file_name: String, content: String },
}

#[derive(Debug, Clone)]
pub struct LogsPanel {
    item: ItemRef,
    text: String,
    loading: bool,
    follow: bool,
    wrap: bool,
    scroll: u16,
}

impl LogsPanel {
    pub fn new(item: ItemRef) -> Self {
        Self {
            item,
            text: String::new(),
            loading: true,
            follow: false,
            wrap: true,
            scroll: 0,
        }
    }

    pub fn item(&self) -> &ItemRef {
        &self.item
    }

    pub fn title(&self) -> String {
        let mut title = format!("Logs: {}", self.item.name);
        if self.follow {
            title.push_str(" (following)");
        }
        title
    }

    pub fn text(&self) -> &str {
        if self.loading && self.text.is_empty() {
            "Loading logs..."
        } else {
            &self.text
        }
    }

    pub fn follow(&self) -> bool {
        self.follow
    }

    pub fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn begin_fetch(&mut self) {
        self.loading = true;
    }

    pub fn apply(&mut self, result: Result<String, String>) {
        self.loading = false;
        match result {
            Ok(text) => {
                self.text = if text.trim().is_empty() {
                    "No logs available".to_string()
                } else {
                    text
                };
                if self.follow {
                    self.scroll = self.max_scroll();
                }
            }
            Err(error) => {
                self.text = format!("Failed to get logs for {}\n\n{error}", self.item.name);
                self.scroll = 0;
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> LogsOutcome {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => LogsOutcome::Back,
            KeyCode::Char('f') => {
                self.follow = !self.follow;
                if self.follow {
                    LogsOutcome::Refetch
                } else {
                    LogsOutcome::Consumed
                }
            }
            KeyCode::Char('t') => LogsOutcome::Refetch,
            KeyCode::Char('s') => LogsOutcome::Save {
                file_name: log_file_name(&self.item.name, Local::now()),
                content: self.text.clone(),
            },
            KeyCode::Char('c') => {
                self.text.clear();
                self.loading = false;
                self.scroll = 0;
                LogsOutcome::Consumed
            }
            KeyCode::Char('w') => {
                self.wrap = !self.wrap;
                LogsOutcome::Consumed
            }
            KeyCode::Down | KeyCode::Char('j') => self.scroll_by(1),
            KeyCode::Up | KeyCode::Char('k') => self.scroll_by(-1),
            KeyCode::PageDown => self.scroll_by(20),
            KeyCode::PageUp => self.scroll_by(-20),
            KeyCode::Home | KeyCode::Char('g') => {
                self.scroll = 0;
                LogsOutcome::Consumed
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.scroll = self.max_scroll();
                LogsOutcome::Consumed
            }
            _ => LogsOutcome::Consumed,
        }
    }

    fn scroll_by(&mut self, delta: isize) -> LogsOutcome {
        let next = (self.scroll as isize + delta).clamp(0, self.max_scroll() as isize);
        self.scroll = next as u16;
        LogsOutcome::Consumed
    }

    fn max_scroll(&self) -> u16 {
        self.text
            .lines()
            .count()
            .saturating_sub(1)
            .min(u16::MAX as usize) as u16
    }
}

pub fn log_file_name(name: &str, at: chrono::DateTime<Local>) -> String {
    let safe = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect::<String>();
    format!("{safe}_logs_{}.txt", at.format("%Y%m%d_%H%M%S"))
}
