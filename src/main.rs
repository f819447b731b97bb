use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use todo_reminder_server::config::{self, NotificationSinkKind};
use todo_reminder_server::notifications::{
    LogNotificationSink, NotificationSink, WebhookNotificationSink,
};
use todo_reminder_server::reminders::ReminderRuntime;
use todo_reminder_server::server::{metrics, run_metrics_server};
use todo_reminder_server::todo_store::{SqliteTodoStore, TodoRepository};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let canonical_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if canonical_path.is_absolute() {
        return Ok(canonical_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(canonical_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the todos.db database file.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port for the metrics server (Prometheus scraping). 0 disables it.
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// Local hour (0-23) at which the daily sweep re-arms reminders due that day.
    #[clap(long, default_value_t = 0)]
    pub sweep_hour: u32,

    /// Minute of the sweep hour.
    #[clap(long, default_value_t = 0)]
    pub sweep_minute: u32,

    /// Where to deliver reminders. Defaults to webhook when a URL is given, log otherwise.
    #[clap(long)]
    pub sink: Option<NotificationSinkKind>,

    /// URL that receives reminder messages as JSON.
    #[clap(long)]
    pub webhook_url: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            metrics_port: args.metrics_port,
            sweep_hour: args.sweep_hour,
            sweep_minute: args.sweep_minute,
            sink: args.sink,
            webhook_url: args.webhook_url.clone(),
        }
    }
}

fn build_sink(settings: &config::NotificationSettings) -> Result<Arc<dyn NotificationSink>> {
    Ok(match (settings.sink, settings.webhook_url.as_ref()) {
        (NotificationSinkKind::Webhook, Some(url)) => Arc::new(WebhookNotificationSink::new(
            url.clone(),
            settings.webhook_timeout,
        )?),
        (NotificationSinkKind::Webhook, None) => {
            anyhow::bail!("The webhook notification sink requires a webhook_url")
        }
        (NotificationSinkKind::Log, _) => Arc::new(LogNotificationSink),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  metrics_port: {}", app_config.metrics_port);
    info!("  sweep at: {}", app_config.sweep.at);
    info!("  notification sink: {:?}", app_config.notifications.sink);

    info!("Initializing metrics...");
    metrics::init_metrics();

    if !app_config.todo_db_path().exists() {
        info!(
            "Todo database not found at {:?}, creating a new one",
            app_config.todo_db_path()
        );
    }
    let todo_store = Arc::new(SqliteTodoStore::new(app_config.todo_db_path())?);
    let repository: Arc<dyn TodoRepository> = todo_store;

    let sink = build_sink(&app_config.notifications)?;
    info!("Delivering reminders via the {} sink", sink.name());

    let shutdown_token = CancellationToken::new();
    let runtime = ReminderRuntime::start(
        repository,
        sink,
        app_config.reminders.clone(),
        app_config.sweep.clone(),
        shutdown_token.child_token(),
    );

    if app_config.metrics_port != 0 {
        let port = app_config.metrics_port;
        let metrics_shutdown = shutdown_token.clone();
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(port, metrics_shutdown).await {
                error!("Metrics server failed: {:#}", e);
            }
        });
    }

    info!("Reminder server running, press Ctrl+C to stop");
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
    shutdown_token.cancel();
    runtime.shutdown().await;
    Ok(())
}
