mod app;
mod cli;
mod config;
mod docker;
mod input;
mod logs;
mod model;
mod panels;
mod registry;
mod runtime;
mod shell_session;
mod ui;
mod view;

use anyhow::{Context, Result};
use app::{App, AppCommand, LoopEvent};
use clap::Parser;
use cli::CliArgs;
use config::{RuntimeConfig, RuntimeConfigWatcher};
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use docker::{DockerCli, ServiceSet};
use futures::StreamExt;
use panels::build_registry;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use runtime::{Backend, Timings, compact_error};
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Loop-owned state that `App` never sees.
struct Session {
    backend: Backend,
    watcher: RuntimeConfigWatcher,
    args: CliArgs,
    config: RuntimeConfig,
    ticker: Interval,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let mut watcher = RuntimeConfigWatcher::discover(args.config.clone());
    let snapshot = watcher.load_current()?;
    let config = apply_cli_overrides(snapshot.config, &args);
    init_tracing(&config.log_level, config.log_file.as_deref())?;
    info!(
        source = snapshot.source.as_deref().unwrap_or("defaults"),
        "loaded runtime config"
    );

    let services = ServiceSet::docker(DockerCli::new(config.docker_host.clone()));
    let (events_tx, events_rx) = mpsc::unbounded_channel::<LoopEvent>();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let mut app = App::new(shutdown_tx, build_registry(&services), config.log_tail);
    let mut session = Session {
        backend: Backend::new(services, events_tx, timings(&config)),
        watcher,
        args,
        ticker: ticker(&config),
        config,
    };

    run(&mut app, &mut session, events_rx, shutdown_rx).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::sink).try_init();
        }
    }

    Ok(())
}

fn apply_cli_overrides(mut config: RuntimeConfig, args: &CliArgs) -> RuntimeConfig {
    if let Some(secs) = args.refresh_secs {
        config.refresh_interval_secs = secs;
    }
    if let Some(host) = &args.host {
        config.docker_host = Some(host.clone());
    }
    if let Some(view) = &args.view {
        config.default_view = view.clone();
    }
    if let Some(filter) = &args.log_filter {
        config.log_level = filter.clone();
    }
    if let Some(path) = &args.log_file {
        config.log_file = Some(path.clone());
    }
    config
}

fn timings(config: &RuntimeConfig) -> Timings {
    Timings {
        backend_timeout: config.backend_timeout(),
        settle_delay: config.settle_delay(),
        search_debounce: config.search_debounce(),
    }
}

fn ticker(config: &RuntimeConfig) -> Interval {
    let mut ticker = interval(config.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run(
    app: &mut App,
    session: &mut Session,
    events_rx: mpsc::UnboundedReceiver<LoopEvent>,
    shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, session, events_rx, shutdown_rx).await;
    session.backend.shutdown();
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    session: &mut Session,
    mut events_rx: mpsc::UnboundedReceiver<LoopEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let first_view = session.config.default_view.clone();
    let command = app.start(&first_view);
    execute_app_command(app, session, command);
    session.backend.request_engine_info();

    let mut reader = EventStream::new();

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(signature) = input::key_event_signature(key) {
                            debug!(key = %signature, mode = ?app.mode(), "key event");
                        }
                        let command = app.handle_key(key);
                        execute_app_command(app, session, command);
                    }
                    Some(Ok(Event::Resize(_, _))) => {}
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        warn!("terminal event stream closed");
                        break;
                    }
                }
            }
            _ = session.ticker.tick() => {
                session.backend.request_engine_info();
                match app.tick() {
                    AppCommand::List(kind) if session.backend.is_listing(kind) => {
                        debug!(view = kind.name(), "skipping refresh, previous listing in flight");
                    }
                    command => execute_app_command(app, session, command),
                }
            }
            Some(event) = events_rx.recv() => {
                let command = app.apply_event(event);
                execute_app_command(app, session, command);
            }
            _ = shutdown_rx.recv() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

fn execute_app_command(app: &mut App, session: &mut Session, command: AppCommand) {
    match command {
        AppCommand::None => {}
        AppCommand::ReloadConfig => reload_config(app, session),
        command => session.backend.dispatch(command),
    }
}

fn reload_config(app: &mut App, session: &mut Session) {
    match session.watcher.reload_if_changed() {
        Ok(Some(snapshot)) => {
            let config = apply_cli_overrides(snapshot.config, &session.args);
            if config.docker_host != session.config.docker_host {
                warn!("docker host changes take effect after restart");
            }
            session.backend.set_timings(timings(&config));
            session.ticker = ticker(&config);
            app.set_log_tail(config.log_tail);
            let source = snapshot.source.unwrap_or_else(|| "defaults".to_string());
            info!(source = %source, "runtime config reloaded");
            app.set_status(format!("Config reloaded from {source}"));
            session.config = config;
        }
        Ok(None) => app.set_status("Config unchanged"),
        Err(error) => app.show_error("Failed to reload config", compact_error(&error)),
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_cli_overrides, timings};
    use crate::cli::CliArgs;
    use crate::config::RuntimeConfig;
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn cli_flags_override_file_values() {
        let file = RuntimeConfig {
            refresh_interval_secs: 10,
            docker_host: Some("tcp://file:2375".to_string()),
            ..RuntimeConfig::default()
        };
        let args =
            CliArgs::try_parse_from(["skiff", "--refresh-secs", "2", "-H", "unix:///tmp/d.sock"])
                .unwrap();

        let config = apply_cli_overrides(file, &args);
        assert_eq!(config.refresh_interval_secs, 2);
        assert_eq!(config.docker_host.as_deref(), Some("unix:///tmp/d.sock"));
        assert_eq!(config.default_view, "containers");
    }

    #[test]
    fn file_values_survive_without_flags() {
        let file = RuntimeConfig {
            default_view: "images".to_string(),
            backend_timeout_secs: 3,
            ..RuntimeConfig::default()
        };
        let args = CliArgs::try_parse_from(["skiff"]).unwrap();

        let config = apply_cli_overrides(file, &args);
        assert_eq!(config.default_view, "images");
        assert_eq!(timings(&config).backend_timeout, Duration::from_secs(3));
    }
}
