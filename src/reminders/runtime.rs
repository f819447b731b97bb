use super::scheduler::{create_scheduler, ReminderScheduler, ReminderSettings};
use super::sweep::{DailySweep, SweepSettings};
use crate::notifications::NotificationSink;
use crate::todo_store::TodoRepository;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// The running reminder engine: dispatcher plus daily sweep.
pub struct ReminderRuntime {
    scheduler: ReminderScheduler,
    shutdown_token: CancellationToken,
    dispatcher_handle: JoinHandle<()>,
    sweep_handle: JoinHandle<()>,
}

impl ReminderRuntime {
    /// Spawns the dispatcher and the sweep on the current tokio runtime.
    ///
    /// Both stop when `shutdown_token` is cancelled or [`Self::shutdown`] is called.
    pub fn start(
        repository: Arc<dyn TodoRepository>,
        sink: Arc<dyn NotificationSink>,
        reminder_settings: ReminderSettings,
        sweep_settings: SweepSettings,
        shutdown_token: CancellationToken,
    ) -> Self {
        let (dispatcher, scheduler) = create_scheduler(
            Arc::clone(&repository),
            sink,
            reminder_settings,
            shutdown_token.clone(),
        );
        let dispatcher_handle = tokio::spawn(dispatcher.run());

        let sweep = DailySweep::new(repository, scheduler.clone(), sweep_settings);
        let sweep_handle = tokio::spawn(sweep.run(shutdown_token.clone()));

        info!("Reminder runtime started");
        Self {
            scheduler,
            shutdown_token,
            dispatcher_handle,
            sweep_handle,
        }
    }

    pub fn scheduler(&self) -> ReminderScheduler {
        self.scheduler.clone()
    }

    /// Stops the sweep and the dispatcher, waiting for in-flight reminders
    /// up to the configured grace period.
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        if let Err(e) = self.sweep_handle.await {
            error!("Daily sweep task failed: {}", e);
        }
        if let Err(e) = self.dispatcher_handle.await {
            error!("Reminder dispatcher task failed: {}", e);
        }
        info!("Reminder runtime stopped");
    }
}
