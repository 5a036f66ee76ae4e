//! bs - botsync coordinator and control surface
//!
//! `bs serve` runs the coordinator on a Unix socket; every other command
//! talks to a running coordinator as a control surface.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use botsync::aggregate::{AggregateEngine, Snapshot};
use botsync::cli::{Cli, Command, EmitCommand, OutputFormat, get_log_path};
use botsync::config::Config;
use botsync::coordinator::Coordinator;
use botsync::domain::{DomainEvent, LogEntry, LogType, Preferences, RunState, Unseen};
use botsync::ipc::{self, CoordinatorClient, SocketPages};
use botsync::protocol::{Envelope, ErrorReport, MessageId, PageId, RelayReport, RunStateView, WarnReport};
use sessionstore::{FileStore, MemoryStore};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(socket) = cli.socket {
        config.socket_path = Some(socket);
    }

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve => cmd_serve(&config).await,
        Command::Status { format } => cmd_run_state(&config, MessageId::SurfaceGetRunState, None, format).await,
        Command::Refresh => cmd_run_state(&config, MessageId::SurfaceRefreshState, None, OutputFormat::Text).await,
        Command::Run { prefs } => {
            let data = prefs.as_deref().map(load_preferences).transpose()?;
            cmd_run_state(&config, MessageId::SurfaceRun, data, OutputFormat::Text).await
        }
        Command::Toggle { prefs } => {
            let data = prefs.as_deref().map(load_preferences).transpose()?;
            cmd_run_state(&config, MessageId::SurfaceToggle, data, OutputFormat::Text).await
        }
        Command::Everything { format } => cmd_everything(&config, format).await,
        Command::Clear { log_type } => cmd_clear(&config, log_type.into()).await,
        Command::Reset => cmd_reset(&config).await,
        Command::Sync { prefs } => cmd_sync(&config, &prefs).await,
        Command::Emit { page, report } => cmd_emit(&config, PageId::new(page), report).await,
        Command::Watch => cmd_watch(&config).await,
    }
}

fn client(config: &Config) -> CoordinatorClient {
    CoordinatorClient::with_socket_path(config.socket_path()).with_timeout(config.client.timeout())
}

/// Read a YAML preferences file into wire form
fn load_preferences(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    let prefs: Preferences = serde_yaml::from_str(&content).context("Failed to parse preferences")?;
    Ok(prefs.to_wire())
}

fn envelope(id: MessageId, data: Option<Value>) -> Envelope {
    match data {
        Some(data) => Envelope::with_data(id, data),
        None => Envelope::new(id),
    }
}

/// Run the coordinator until SIGINT or SIGTERM
async fn cmd_serve(config: &Config) -> Result<()> {
    debug!("cmd_serve: called");
    let durable = FileStore::open(&config.storage.durable_path).context("Failed to open durable store")?;
    let engine = AggregateEngine::spawn(Box::new(MemoryStore::new()), config.retention.clone());
    let pages = Arc::new(SocketPages::new());
    let handle = Coordinator::new(config.coordinator.clone(), pages.clone(), engine.clone(), Box::new(durable)).spawn();

    let socket_path = config.socket_path();
    let (listener, socket_path) = ipc::create_listener_at(&socket_path)?;
    info!(?socket_path, "IPC socket listening");
    println!("{} listening on {}", "botsync".bold(), socket_path.display());

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let listener_handle = tokio::spawn(ipc::serve(listener, handle.clone(), pages, shutdown_rx));

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!("Coordinator shutting down...");
    let _ = shutdown_tx.send(()).await;
    let _ = listener_handle.await;
    let _ = handle.shutdown().await;
    let _ = engine.shutdown().await;
    ipc::cleanup_socket(&socket_path);
    Ok(())
}

fn state_colored(state: RunState) -> colored::ColoredString {
    let label = state.label();
    match state {
        RunState::Running => label.green().bold(),
        RunState::Idle => label.cyan(),
        RunState::WaitingInjection | RunState::Setup => label.yellow(),
        RunState::InjectionError | RunState::Error => label.red().bold(),
        RunState::Unknown => label.dimmed(),
    }
}

fn print_run_state(view: &RunStateView) {
    println!("State:  {}", state_colored(view.state));
    if let Some(reason) = &view.reason {
        println!("Reason: {}", reason);
    }
}

async fn cmd_run_state(config: &Config, id: MessageId, data: Option<Value>, format: OutputFormat) -> Result<()> {
    debug!(%id, "cmd_run_state: called");
    let reply = client(config).request_required(&envelope(id, data)).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reply)?),
        OutputFormat::Text => {
            let view: RunStateView = serde_json::from_value(reply).context("Unexpected run state reply")?;
            print_run_state(&view);
        }
    }
    Ok(())
}

fn type_colored(log_type: LogType, text: &str) -> colored::ColoredString {
    match log_type {
        LogType::Event => text.green(),
        LogType::Warn => text.yellow(),
        LogType::Error => text.red(),
    }
}

fn print_unseen(unseen: &Unseen) {
    let parts: Vec<String> = LogType::ALL
        .iter()
        .map(|t| type_colored(*t, &format!("{}={}", t, unseen.get(*t))).to_string())
        .collect();
    println!("Unseen: {}", parts.join(" "));
}

fn describe(entry: &LogEntry) -> String {
    match entry {
        LogEntry::Event {
            event_type, event_data, ..
        } => format!("{} {}", event_type, event_data),
        LogEntry::Warn { message, .. } => message.clone(),
        LogEntry::Error {
            message, is_critical, ..
        } => {
            if *is_critical {
                format!("{} (critical)", message)
            } else {
                message.clone()
            }
        }
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("{}", "Stats".bold());
    for (user, characters) in &snapshot.stats.characters {
        println!("  {} claimed {}", user, characters.join(", "));
    }
    for (user, characters) in &snapshot.stats.soulmates {
        println!("  {} soulmates {}", user, characters.join(", "));
    }
    for steal in &snapshot.stats.steals {
        println!(
            "  stolen {} by {}",
            steal.character.as_deref().unwrap_or("?"),
            steal.user.as_deref().unwrap_or("?")
        );
    }
    for (kind, count) in &snapshot.stats.kakera.per_type {
        println!("  kakera {}: {}", kind, count);
    }
    for (user, amount) in &snapshot.stats.kakera.amount {
        println!("  {} gained {} kakera", user, amount);
    }

    for log_type in LogType::ALL {
        let entries = snapshot.logs.entries(log_type);
        println!("{} ({})", type_colored(log_type, log_type.as_str()).bold(), entries.len());
        for entry in entries {
            println!("  {} {}", entry.time().dimmed(), describe(entry));
        }
    }
    print_unseen(&snapshot.unseen);
}

async fn cmd_everything(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_everything: called");
    let reply = client(config)
        .request_required(&Envelope::new(MessageId::SurfaceGetEverything))
        .await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reply)?),
        OutputFormat::Text => {
            let snapshot: Snapshot = serde_json::from_value(reply).context("Unexpected snapshot reply")?;
            print_snapshot(&snapshot);
        }
    }
    Ok(())
}

async fn cmd_clear(config: &Config, log_type: LogType) -> Result<()> {
    debug!(%log_type, "cmd_clear: called");
    let request = Envelope::with_data(MessageId::SurfaceClearUnseen, json!({ "type": log_type }));
    let reply = client(config).request_required(&request).await?;
    let unseen: Unseen = serde_json::from_value(reply).context("Unexpected unseen reply")?;
    print_unseen(&unseen);
    Ok(())
}

async fn cmd_reset(config: &Config) -> Result<()> {
    debug!("cmd_reset: called");
    client(config)
        .request_required(&Envelope::new(MessageId::SurfaceResetSession))
        .await?;
    println!("Session logs and stats cleared");
    Ok(())
}

async fn cmd_sync(config: &Config, prefs: &Path) -> Result<()> {
    debug!(?prefs, "cmd_sync: called");
    let request = Envelope::with_data(MessageId::SurfaceSyncPreferences, load_preferences(prefs)?);
    let reply = client(config).request_required(&request).await?;
    let report: RelayReport = serde_json::from_value(reply).context("Unexpected relay reply")?;
    for page in &report.delivered {
        println!("{} {}", "delivered".green(), page);
    }
    for failure in &report.failures {
        println!("{} {}: {}", "failed".red(), failure.page_id, failure.error);
    }
    if report.delivered.is_empty() && report.failures.is_empty() {
        println!("No pages connected");
    }
    Ok(())
}

async fn cmd_emit(config: &Config, page: PageId, report: EmitCommand) -> Result<()> {
    debug!(%page, ?report, "cmd_emit: called");
    let request = match report {
        EmitCommand::Event { kind, data } => {
            let data: Value = serde_json::from_str(&data).context("Event data must be JSON")?;
            Envelope::with_data(MessageId::PageEvent, json!(DomainEvent::new(kind.into(), data)))
        }
        EmitCommand::Warn { message } => Envelope::with_data(MessageId::PageWarn, json!(WarnReport { message })),
        EmitCommand::Error { message, critical } => Envelope::with_data(
            MessageId::PageError,
            json!(ErrorReport {
                message,
                is_critical: critical,
            }),
        ),
    };
    let reply = client(config).as_page(page).request_required(&request).await?;
    if reply.get("ok").and_then(Value::as_bool) == Some(true) {
        println!("{}", "recorded".green());
        Ok(())
    } else {
        Err(eyre::eyre!("Coordinator did not record the report: {}", reply))
    }
}

async fn cmd_watch(config: &Config) -> Result<()> {
    debug!("cmd_watch: called");
    let mut stream = client(config).watch().await?;
    println!("Watching {} (Ctrl+C to stop)", config.socket_path().display());
    while let Some(push) = stream.next().await? {
        let data = push.data.unwrap_or(Value::Null);
        match push.id {
            MessageId::BotRunState => match serde_json::from_value::<RunStateView>(data) {
                Ok(view) => print_run_state(&view),
                Err(e) => warn!(error = %e, "Unreadable run state push"),
            },
            MessageId::BotBadge => {
                let text = data.get("text").and_then(Value::as_str).unwrap_or_default();
                println!("Badge:  [{}]", text.bold());
            }
            other => debug!(%other, "cmd_watch: ignoring push"),
        }
    }
    println!("Coordinator closed the connection");
    Ok(())
}
