use crate::input::edit_line;
use crate::model::{ItemRef, short_id};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const INTERACTIVE_COMMANDS: &[&str] = &[
    "top", "htop", "vim", "vi", "nano", "emacs", "less", "more", "watch", "man", "info", "ncurses",
    "dialog", "whiptail", "screen", "tmux", "byobu", "mosh", "ssh", "telnet", "ftp", "sftp",
    "ncftp", "lynx", "links", "w3m", "mysql", "psql", "sqlite3", "redis-cli", "mongo", "irb",
    "python", "node", "gdb", "lldb", "perf", "strace", "ltrace", "valgrind", "gprof",
];

const SCROLLBACK_LINES: usize = 2_000;

pub const SHELL_LEGEND: &str =
    "<enter> Run\n↑/↓: History\n<ctrl-c> Clear line\n<ctrl-l> Clear screen\n<esc> Back";

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ShellOutcome {
    Consumed,
    Exit,
    Run(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ShellSession {
    target: ItemRef,
    output: Vec<String>,
    input: String,
    history: Vec<String>,
    history_index: usize,
    draft: String,
    continuation: Vec<String>,
    running: bool,
    scrollback: usize,
}

impl ShellSession {
    pub fn new(target: ItemRef) -> Self {
        let mut session = Self {
            target,
            output: Vec::new(),
            input: String::new(),
            history: Vec::new(),
            history_index: 0,
            draft: String::new(),
            continuation: Vec::new(),
            running: false,
            scrollback: SCROLLBACK_LINES,
        };
        session.reset_output();
        session
    }

    pub fn target(&self) -> &ItemRef {
        &self.target
    }

    pub fn title(&self) -> String {
        format!("Shell: {}", self.target.name)
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn prompt(&self) -> &'static str {
        if self.continuation.is_empty() { "$ " } else { "> " }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ShellOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => {
                    self.input.clear();
                    self.continuation.clear();
                    return ShellOutcome::Consumed;
                }
                KeyCode::Char('l') => {
                    self.reset_output();
                    return ShellOutcome::Consumed;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Esc => ShellOutcome::Exit,
            KeyCode::Enter => {
                let outcome = self.submit();
                self.trim_scrollback();
                outcome
            }
            KeyCode::Up => {
                self.walk_history(-1);
                ShellOutcome::Consumed
            }
            KeyCode::Down => {
                self.walk_history(1);
                ShellOutcome::Consumed
            }
            _ => {
                edit_line(&mut self.input, key);
                ShellOutcome::Consumed
            }
        }
    }

    /// Appends the result of a finished `docker exec`.
    pub fn finish(&mut self, result: Result<String, String>) {
        self.running = false;
        match result {
            Ok(output) => {
                self.output.extend(output.lines().map(str::to_string));
            }
            Err(error) => self.output.push(format!("Error: {error}")),
        }
        self.trim_scrollback();
    }

    /// Drops the oldest lines once output exceeds the scrollback.
    fn trim_scrollback(&mut self) {
        let excess = self.output.len().saturating_sub(self.scrollback);
        if excess > 0 {
            self.output.drain(..excess);
        }
    }

    fn submit(&mut self) -> ShellOutcome {
        let line = std::mem::take(&mut self.input);
        if line.is_empty() && self.continuation.is_empty() {
            return ShellOutcome::Consumed;
        }

        if let Some(partial) = line.strip_suffix('\\') {
            self.output.push(format!("> {line}"));
            self.continuation.push(partial.to_string());
            return ShellOutcome::Consumed;
        }

        let command = if self.continuation.is_empty() {
            line
        } else {
            let mut parts = std::mem::take(&mut self.continuation);
            parts.push(line);
            parts.join(" ")
        };
        let command = command.trim().to_string();
        if command.is_empty() {
            return ShellOutcome::Consumed;
        }

        self.output.push(format!("$ {command}"));
        self.record_history(&command);

        match command.as_str() {
            "exit" | "quit" => {
                self.output.push("Exiting shell...".to_string());
                return ShellOutcome::Exit;
            }
            "clear" => {
                self.reset_output();
                return ShellOutcome::Consumed;
            }
            "help" => {
                self.push_help();
                return ShellOutcome::Consumed;
            }
            _ => {}
        }

        if self.running {
            self.output
                .push("Error: previous command is still running".to_string());
            return ShellOutcome::Consumed;
        }

        if is_interactive_command(&command) {
            self.push_interactive_warning();
            return ShellOutcome::Consumed;
        }

        let args = parse_command_args(&command);
        if args.is_empty() {
            self.output.push("Error: invalid command".to_string());
            return ShellOutcome::Consumed;
        }
        self.running = true;
        ShellOutcome::Run(args)
    }

    fn record_history(&mut self, command: &str) {
        if self.history.last().map(String::as_str) != Some(command) {
            self.history.push(command.to_string());
        }
        self.history_index = self.history.len();
        self.draft.clear();
    }

    fn walk_history(&mut self, direction: isize) {
        if self.history.is_empty() {
            return;
        }
        if self.history_index == self.history.len() {
            self.draft = self.input.clone();
        }

        let next = (self.history_index as isize + direction).clamp(0, self.history.len() as isize);
        self.history_index = next as usize;
        self.input = match self.history.get(self.history_index) {
            Some(entry) => entry.clone(),
            None => self.draft.clone(),
        };
    }

    fn reset_output(&mut self) {
        self.output = vec![
            format!(
                "Welcome to shell for container: {} ({})",
                self.target.name,
                short_id(&self.target.id)
            ),
            "Type 'exit' or press ESC to return to container view".to_string(),
            String::new(),
        ];
    }

    fn push_help(&mut self) {
        self.output.extend(
            [
                "Built-in commands:",
                "  exit, quit  leave the shell",
                "  clear       clear the output",
                "  help        show this help",
                "Lines ending with \\ continue on the next line.",
                "Commands with pipes or redirects run through /bin/sh -c.",
            ]
            .map(str::to_string),
        );
    }

    fn push_interactive_warning(&mut self) {
        self.output.extend(
            [
                "Warning: this is an interactive command and needs a real TTY.",
                "  Try 'ps aux' instead of 'top' or 'cat' instead of 'less'.",
            ]
            .map(str::to_string),
        );
    }
}

pub fn is_interactive_command(command: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .map(|program| program.rsplit('/').next().unwrap_or(program))
        .is_some_and(|program| INTERACTIVE_COMMANDS.contains(&program))
}

/// Splits a command line for `docker exec`, deferring to `/bin/sh -c` when it uses shell syntax.
pub fn parse_command_args(command: &str) -> Vec<String> {
    let command = command.trim();
    if ["|", ">", "<", "&&", "||"]
        .iter()
        .any(|token| command.contains(token))
    {
        return vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()];
    }
    command.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::{ShellOutcome, ShellSession, is_interactive_command, parse_command_args};
    use crate::model::{ItemRef, ResourceKind};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn session() -> ShellSession {
        ShellSession::new(ItemRef {
            kind: ResourceKind::Containers,
            id: "0123456789abcdef".to_string(),
            name: "web".to_string(),
        })
    }

    fn type_line(session: &mut ShellSession, line: &str) -> ShellOutcome {
        for c in line.chars() {
            session.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
        session.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
    }

    fn press(session: &mut ShellSession, code: KeyCode) {
        session.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn welcome_banner_names_container() {
        let session = session();
        assert_eq!(
            session.output()[0],
            "Welcome to shell for container: web (0123456789ab)"
        );
    }

    #[test]
    fn enter_runs_parsed_command() {
        let mut session = session();
        assert_eq!(
            type_line(&mut session, "ls -la"),
            ShellOutcome::Run(vec!["ls".to_string(), "-la".to_string()])
        );
        assert!(session.running());
        session.finish(Ok("a\nb\n".to_string()));
        assert!(!session.running());
        assert!(session.output().ends_with(&["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn output_keeps_only_the_newest_lines() {
        let mut session = session();
        session.scrollback = 5;
        type_line(&mut session, "seq 10");
        session.finish(Ok((1..=10).map(|n| format!("{n}\n")).collect()));

        assert_eq!(session.output().len(), 5);
        assert_eq!(session.output().first().map(String::as_str), Some("6"));
        assert_eq!(session.output().last().map(String::as_str), Some("10"));

        type_line(&mut session, "help");
        assert_eq!(session.output().len(), 5);
    }

    #[test]
    fn builtins_do_not_reach_docker() {
        let mut session = session();
        assert_eq!(type_line(&mut session, "help"), ShellOutcome::Consumed);
        assert_eq!(type_line(&mut session, "clear"), ShellOutcome::Consumed);
        assert_eq!(session.output().len(), 3);
        assert_eq!(type_line(&mut session, "exit"), ShellOutcome::Exit);
    }

    #[test]
    fn interactive_programs_are_refused() {
        let mut session = session();
        assert_eq!(type_line(&mut session, "top -b"), ShellOutcome::Consumed);
        assert!(session.output().iter().any(|line| line.contains("interactive")));
        assert!(is_interactive_command("/usr/bin/vim file"));
        assert!(!is_interactive_command("cat file"));
    }

    #[test]
    fn continuation_lines_join() {
        let mut session = session();
        assert_eq!(type_line(&mut session, "echo one \\"), ShellOutcome::Consumed);
        assert_eq!(session.prompt(), "> ");
        assert_eq!(
            type_line(&mut session, "two"),
            ShellOutcome::Run(vec![
                "echo".to_string(),
                "one".to_string(),
                "two".to_string()
            ])
        );
    }

    #[test]
    fn history_skips_duplicates_and_restores_draft() {
        let mut session = session();
        type_line(&mut session, "pwd");
        session.finish(Ok(String::new()));
        type_line(&mut session, "pwd");
        session.finish(Ok(String::new()));
        type_line(&mut session, "id");
        session.finish(Ok(String::new()));

        for c in "ec".chars() {
            press(&mut session, KeyCode::Char(c));
        }
        press(&mut session, KeyCode::Up);
        assert_eq!(session.input(), "id");
        press(&mut session, KeyCode::Up);
        assert_eq!(session.input(), "pwd");
        press(&mut session, KeyCode::Up);
        assert_eq!(session.input(), "pwd");
        press(&mut session, KeyCode::Down);
        press(&mut session, KeyCode::Down);
        assert_eq!(session.input(), "ec");
    }

    #[test]
    fn ctrl_c_clears_line_and_escape_exits() {
        let mut session = session();
        press(&mut session, KeyCode::Char('x'));
        session.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(session.input(), "");
        assert_eq!(
            session.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)),
            ShellOutcome::Exit
        );
    }

    #[test]
    fn shell_syntax_runs_through_sh() {
        assert_eq!(
            parse_command_args("ps aux | grep nginx"),
            vec!["/bin/sh", "-c", "ps aux | grep nginx"]
        );
        assert_eq!(parse_command_args("  env  "), vec!["env"]);
        assert!(parse_command_args("   ").is_empty());
    }
}
