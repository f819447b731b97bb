mod file_config;

pub use file_config::{FileConfig, NotificationsConfig, RemindersConfig, SweepConfig};

use crate::reminders::{ReminderSettings, ReminderTime, SweepSettings};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// Where rendered reminders go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NotificationSinkKind {
    /// Write reminders to the log only.
    #[default]
    Log,
    /// POST reminders as JSON to a webhook.
    Webhook,
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub metrics_port: u16,
    pub sweep_hour: u32,
    pub sweep_minute: u32,
    pub sink: Option<NotificationSinkKind>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    /// 0 disables the metrics endpoint.
    pub metrics_port: u16,

    // Feature configs (with defaults)
    pub reminders: ReminderSettings,
    pub sweep: SweepSettings,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    pub sink: NotificationSinkKind,
    pub webhook_url: Option<String>,
    pub webhook_timeout: Duration,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sink: NotificationSinkKind::Log,
            webhook_url: None,
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        // Reminder dispatch settings
        let reminders_file = file.reminders.unwrap_or_default();
        let defaults = ReminderSettings::default();
        let reminders = ReminderSettings {
            delivery_timeout: positive_secs(
                "reminders.delivery_timeout_secs",
                reminders_file.delivery_timeout_secs,
                defaults.delivery_timeout,
            )?,
            max_sleep: positive_secs(
                "reminders.max_sleep_secs",
                reminders_file.max_sleep_secs,
                defaults.max_sleep,
            )?,
            shutdown_grace: reminders_file
                .shutdown_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
        };

        // Daily sweep settings
        let sweep_file = file.sweep.unwrap_or_default();
        let hour = sweep_file.hour.unwrap_or(cli.sweep_hour);
        let minute = sweep_file.minute.unwrap_or(cli.sweep_minute);
        let at = match ReminderTime::new(hour, minute) {
            Ok(at) => at,
            Err(e) => bail!("Invalid sweep time {}:{}: {}", hour, minute, e),
        };
        let catch_up_window = match sweep_file.catch_up_window_mins {
            None => None,
            Some(mins) => match mins.checked_mul(60) {
                Some(secs) => Some(Duration::from_secs(secs)),
                None => bail!("sweep.catch_up_window_mins is too large: {}", mins),
            },
        };
        let sweep = SweepSettings {
            at,
            on_startup: sweep_file.on_startup.unwrap_or(true),
            catch_up_window,
        };

        // Notification sink - an explicit choice wins, otherwise a webhook URL implies the webhook sink
        let notifications_file = file.notifications.unwrap_or_default();
        let webhook_url = notifications_file
            .webhook_url
            .or_else(|| cli.webhook_url.clone());
        let sink = match notifications_file.sink {
            Some(s) => match parse_sink_kind(&s) {
                Some(kind) => kind,
                None => bail!("Unknown notification sink {:?}, expected log or webhook", s),
            },
            None => cli.sink.unwrap_or(if webhook_url.is_some() {
                NotificationSinkKind::Webhook
            } else {
                NotificationSinkKind::Log
            }),
        };
        if sink == NotificationSinkKind::Webhook && webhook_url.is_none() {
            bail!("The webhook notification sink requires a webhook_url");
        }
        let notifications = NotificationSettings {
            sink,
            webhook_url,
            webhook_timeout: positive_secs(
                "notifications.webhook_timeout_secs",
                notifications_file.webhook_timeout_secs,
                NotificationSettings::default().webhook_timeout,
            )?,
        };

        Ok(Self {
            db_dir,
            metrics_port,
            reminders,
            sweep,
            notifications,
        })
    }

    pub fn todo_db_path(&self) -> PathBuf {
        self.db_dir.join("todos.db")
    }
}

fn positive_secs(name: &str, value: Option<u64>, default: Duration) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(0) => bail!("{} must be greater than zero", name),
        Some(secs) => Ok(Duration::from_secs(secs)),
    }
}

/// Parses a sink name into NotificationSinkKind.
/// Uses clap's ValueEnum trait for parsing.
fn parse_sink_kind(s: &str) -> Option<NotificationSinkKind> {
    NotificationSinkKind::from_str(s, true).ok()
}
