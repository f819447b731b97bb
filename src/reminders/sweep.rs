use super::error::ReminderError;
use super::scheduler::ReminderScheduler;
use super::time_parser::{trigger_instant, trigger_instant_in, ReminderTime};
use crate::server::metrics;
use crate::todo_store::TodoRepository;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// The sweep loop re-checks the wall clock at least this often while waiting.
const SWEEP_RECHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSettings {
    /// Local time of day at which the sweep runs.
    pub at: ReminderTime,
    pub on_startup: bool,
    /// Reminders that came due longer ago than this are not re-armed.
    /// None re-arms everything due today, firing past ones immediately.
    pub catch_up_window: Option<Duration>,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            at: ReminderTime::MIDNIGHT,
            on_startup: true,
            catch_up_window: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub armed: usize,
    pub skipped: usize,
}

/// Re-arms every reminder due today. Runs once a day and on startup.
#[derive(Clone)]
pub struct DailySweep {
    repository: Arc<dyn TodoRepository>,
    scheduler: ReminderScheduler,
    settings: SweepSettings,
}

impl DailySweep {
    pub fn new(
        repository: Arc<dyn TodoRepository>,
        scheduler: ReminderScheduler,
        settings: SweepSettings,
    ) -> Self {
        Self {
            repository,
            scheduler,
            settings,
        }
    }

    pub fn run_once(&self, today: NaiveDate) -> Result<SweepReport, ReminderError> {
        self.run_once_at(today, Utc::now())
    }

    /// Runs one sweep for `today` as if the current instant were `now`.
    pub fn run_once_at(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, ReminderError> {
        let todos = self
            .repository
            .list_due_reminders(today)
            .map_err(|e| ReminderError::Repository(e.to_string()))?;
        info!("Found {} todos with reminders for {}", todos.len(), today);

        let oldest_allowed = self
            .settings
            .catch_up_window
            .and_then(|window| chrono::Duration::from_std(window).ok())
            .map(|window| now - window);

        let mut report = SweepReport::default();
        for todo in todos {
            let Some(time) = todo.reminder_time else {
                debug!("Todo {} has a reminder but no time, skipping", todo.id);
                report.skipped += 1;
                continue;
            };

            let trigger_at = trigger_instant(today, time);
            if oldest_allowed.is_some_and(|oldest| trigger_at < oldest) {
                debug!(
                    "Todo {} reminder at {} is outside the catch-up window, skipping",
                    todo.id, trigger_at
                );
                report.skipped += 1;
                continue;
            }

            self.scheduler.schedule(todo.id, trigger_at)?;
            report.armed += 1;
        }

        Ok(report)
    }

    /// Sweeps on startup if configured, then once a day until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting daily reminder sweep at {} local time", self.settings.at);

        if self.settings.on_startup {
            self.sweep_today().await;
        }

        loop {
            let next = next_sweep_at(&Local, Utc::now(), self.settings.at);
            info!("Next reminder sweep at {}", next.with_timezone(&Local));

            loop {
                let remaining = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                if remaining.is_zero() {
                    break;
                }
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Daily sweep stopped");
                        return;
                    }
                    _ = tokio::time::sleep(remaining.min(SWEEP_RECHECK_INTERVAL)) => {}
                }
            }

            self.sweep_today().await;
        }
    }

    async fn sweep_today(&self) {
        let today = Local::now().date_naive();
        let sweep = self.clone();
        match tokio::task::spawn_blocking(move || sweep.run_once(today)).await {
            Ok(Ok(report)) => {
                info!(
                    "Reminder sweep for {} armed {} and skipped {}",
                    today, report.armed, report.skipped
                );
                metrics::record_sweep_run("success", report.armed);
            }
            Ok(Err(e)) => {
                error!("Reminder sweep for {} failed: {}", today, e);
                metrics::record_sweep_run("failed", 0);
            }
            Err(e) => {
                error!("Reminder sweep task for {} panicked: {}", today, e);
                metrics::record_sweep_run("failed", 0);
            }
        }
    }
}

/// The first occurrence of `at` in `tz` strictly after `now`.
pub fn next_sweep_at<Tz: TimeZone>(tz: &Tz, now: DateTime<Utc>, at: ReminderTime) -> DateTime<Utc> {
    let today = now.with_timezone(tz).date_naive();
    let candidate = trigger_instant_in(tz, today, at);
    if candidate > now {
        return candidate;
    }
    match today.succ_opt() {
        Some(tomorrow) => trigger_instant_in(tz, tomorrow, at),
        None => candidate,
    }
}
