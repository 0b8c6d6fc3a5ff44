use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    Normal,
    CommandEntry,
    SearchEntry,
    ExecInput,
    ShellActive,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DispatchState {
    pub modal_active: bool,
    pub mode: Mode,
    pub in_details: bool,
    pub in_logs: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GlobalAction {
    Shutdown,
    EnterCommand,
    EnterSearch,
    Back,
    Discard,
}

/// Where a keystroke goes. Variants carrying a `KeyEvent` pass it on unmodified.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Route {
    Modal(KeyEvent),
    Shell(KeyEvent),
    CommandInput(KeyEvent),
    ExitCommand,
    SearchInput { key: KeyEvent, refilter: bool },
    CommitSearch,
    CancelSearch,
    ExecInput(KeyEvent),
    CloseExec,
    Panel(KeyEvent),
    Global(GlobalAction),
}

pub fn route(state: DispatchState, key: KeyEvent) -> Route {
    if state.modal_active {
        return Route::Modal(key);
    }

    match state.mode {
        // The shell input and the shell sub-view both own every key, Esc included.
        Mode::ShellActive => Route::Shell(key),
        Mode::CommandEntry => match key.code {
            KeyCode::Esc => Route::ExitCommand,
            _ => Route::CommandInput(key),
        },
        Mode::SearchEntry => match key.code {
            KeyCode::Enter => Route::CommitSearch,
            KeyCode::Esc => Route::CancelSearch,
            KeyCode::Char(_) | KeyCode::Backspace | KeyCode::Delete => Route::SearchInput {
                key,
                refilter: true,
            },
            _ => Route::SearchInput {
                key,
                refilter: false,
            },
        },
        Mode::ExecInput => match key.code {
            KeyCode::Esc => Route::CloseExec,
            _ => Route::ExecInput(key),
        },
        Mode::Normal => route_normal(state, key),
    }
}

fn route_normal(state: DispatchState, key: KeyEvent) -> Route {
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Route::Global(GlobalAction::Shutdown)
        }
        KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => Route::Panel(key),
        KeyCode::Char('q') | KeyCode::Char('Q') => Route::Global(GlobalAction::Shutdown),
        KeyCode::Char(':') => Route::Global(GlobalAction::EnterCommand),
        KeyCode::Char('/') => Route::Global(GlobalAction::EnterSearch),
        KeyCode::Backspace if state.in_details || state.in_logs => {
            Route::Global(GlobalAction::Back)
        }
        KeyCode::Backspace => Route::Global(GlobalAction::Discard),
        _ => Route::Panel(key),
    }
}

/// Applies a line-editing key to `buffer`. Returns true when the text changed.
pub fn edit_line(buffer: &mut String, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let changed = !buffer.is_empty();
            buffer.clear();
            changed
        }
        KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            delete_last_word(buffer)
        }
        KeyCode::Char(c)
            if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
        {
            buffer.push(c);
            true
        }
        KeyCode::Backspace => buffer.pop().is_some(),
        KeyCode::Delete => delete_last_word(buffer),
        _ => false,
    }
}

fn delete_last_word(buffer: &mut String) -> bool {
    let before = buffer.len();
    while buffer.ends_with(' ') {
        buffer.pop();
    }
    while !buffer.ends_with(' ') && !buffer.is_empty() {
        buffer.pop();
    }
    buffer.len() != before
}

/// `ctrl+c` style rendering of a key press, for debug logs.
pub fn key_event_signature(key: KeyEvent) -> Option<String> {
    let name = match key.code {
        KeyCode::Char(' ') => "space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::F(n) => format!("f{n}"),
        KeyCode::Null | KeyCode::Modifier(_) | KeyCode::Media(_) => return None,
        code => format!("{code:?}").to_ascii_lowercase(),
    };
    let modifiers = [(KeyModifiers::CONTROL, "ctrl+"), (KeyModifiers::ALT, "alt+")]
        .into_iter()
        .filter(|(flag, _)| key.modifiers.contains(*flag))
        .map(|(_, prefix)| prefix)
        .collect::<String>();
    Some(format!("{modifiers}{name}"))
}

#[cfg(test)]
mod tests {
    use super::{DispatchState, GlobalAction, Mode, Route, edit_line, key_event_signature, route};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    const MODES: [Mode; 5] = [
        Mode::Normal,
        Mode::CommandEntry,
        Mode::SearchEntry,
        Mode::ExecInput,
        Mode::ShellActive,
    ];

    fn normal() -> DispatchState {
        DispatchState {
            modal_active: false,
            mode: Mode::Normal,
            in_details: false,
            in_logs: false,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn modal_wins_over_every_mode_and_flag() {
        let keys = [
            key(KeyCode::Char('q')),
            key(KeyCode::Char(':')),
            key(KeyCode::Esc),
            key(KeyCode::Enter),
            key(KeyCode::Backspace),
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        ];
        for mode in MODES {
            for in_details in [false, true] {
                for in_logs in [false, true] {
                    let state = DispatchState {
                        modal_active: true,
                        mode,
                        in_details,
                        in_logs,
                    };
                    for event in keys {
                        assert_eq!(route(state, event), Route::Modal(event));
                    }
                }
            }
        }
    }

    #[test]
    fn shell_mode_passes_everything_through() {
        let state = DispatchState {
            mode: Mode::ShellActive,
            in_details: true,
            ..normal()
        };
        for event in [
            key(KeyCode::Esc),
            key(KeyCode::Char('q')),
            key(KeyCode::Backspace),
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        ] {
            assert_eq!(route(state, event), Route::Shell(event));
        }
    }

    #[test]
    fn command_mode_only_intercepts_escape() {
        let state = DispatchState {
            mode: Mode::CommandEntry,
            ..normal()
        };
        assert_eq!(route(state, key(KeyCode::Esc)), Route::ExitCommand);
        let q = key(KeyCode::Char('q'));
        assert_eq!(route(state, q), Route::CommandInput(q));
        let enter = key(KeyCode::Enter);
        assert_eq!(route(state, enter), Route::CommandInput(enter));
    }

    #[test]
    fn search_mode_commits_cancels_and_refilters() {
        let state = DispatchState {
            mode: Mode::SearchEntry,
            ..normal()
        };
        assert_eq!(route(state, key(KeyCode::Enter)), Route::CommitSearch);
        assert_eq!(route(state, key(KeyCode::Esc)), Route::CancelSearch);

        for code in [KeyCode::Char('x'), KeyCode::Backspace, KeyCode::Delete] {
            assert_eq!(
                route(state, key(code)),
                Route::SearchInput {
                    key: key(code),
                    refilter: true
                }
            );
        }
        assert_eq!(
            route(state, key(KeyCode::Left)),
            Route::SearchInput {
                key: key(KeyCode::Left),
                refilter: false
            }
        );
    }

    #[test]
    fn exec_overlay_only_intercepts_escape() {
        let state = DispatchState {
            mode: Mode::ExecInput,
            ..normal()
        };
        assert_eq!(route(state, key(KeyCode::Esc)), Route::CloseExec);
        let q = key(KeyCode::Char('q'));
        assert_eq!(route(state, q), Route::ExecInput(q));
    }

    #[test]
    fn normal_mode_global_bindings() {
        let state = normal();
        assert_eq!(
            route(state, key(KeyCode::Char('q'))),
            Route::Global(GlobalAction::Shutdown)
        );
        assert_eq!(
            route(state, KeyEvent::new(KeyCode::Char('Q'), KeyModifiers::SHIFT)),
            Route::Global(GlobalAction::Shutdown)
        );
        assert_eq!(
            route(state, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Route::Global(GlobalAction::Shutdown)
        );
        assert_eq!(
            route(state, key(KeyCode::Char(':'))),
            Route::Global(GlobalAction::EnterCommand)
        );
        assert_eq!(
            route(state, key(KeyCode::Char('/'))),
            Route::Global(GlobalAction::EnterSearch)
        );
        let r = key(KeyCode::Char('r'));
        assert_eq!(route(state, r), Route::Panel(r));
    }

    #[test]
    fn backspace_goes_back_only_from_sub_views() {
        assert_eq!(
            route(normal(), key(KeyCode::Backspace)),
            Route::Global(GlobalAction::Discard)
        );

        let details = DispatchState {
            in_details: true,
            ..normal()
        };
        assert_eq!(
            route(details, key(KeyCode::Backspace)),
            Route::Global(GlobalAction::Back)
        );

        let logs = DispatchState {
            in_logs: true,
            ..normal()
        };
        assert_eq!(
            route(logs, key(KeyCode::Backspace)),
            Route::Global(GlobalAction::Back)
        );
    }

    #[test]
    fn edit_line_handles_typing_and_deletion() {
        let mut buffer = String::new();
        assert!(edit_line(&mut buffer, key(KeyCode::Char('l'))));
        assert!(edit_line(&mut buffer, KeyEvent::new(KeyCode::Char('S'), KeyModifiers::SHIFT)));
        assert_eq!(buffer, "lS");
        assert!(edit_line(&mut buffer, key(KeyCode::Backspace)));
        assert_eq!(buffer, "l");
        assert!(!edit_line(&mut buffer, key(KeyCode::Left)));

        buffer = "ls -la /tmp".to_string();
        assert!(edit_line(&mut buffer, key(KeyCode::Delete)));
        assert_eq!(buffer, "ls -la ");
        assert!(edit_line(&mut buffer, KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)));
        assert!(buffer.is_empty());
        assert!(!edit_line(&mut buffer, key(KeyCode::Backspace)));
    }

    #[test]
    fn hotkey_signature_normalizes_modifiers() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_event_signature(key), Some("ctrl+c".to_string()));
        let key = KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE);
        assert_eq!(key_event_signature(key), Some("f5".to_string()));
        let key = KeyEvent::new(KeyCode::PageDown, KeyModifiers::ALT);
        assert_eq!(key_event_signature(key), Some("alt+pagedown".to_string()));
    }
}
