use super::error::ReminderError;
use super::job_store::{JobKey, JobStore, JobToken, ScheduledJob};
use super::time_parser::todo_trigger_instant;
use crate::notifications::{DeliveryError, NotificationSink, ReminderNotification};
use crate::server::metrics;
use crate::todo_store::{Todo, TodoRepository};
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Below this many queued entries the dispatcher never bothers compacting.
const COMPACT_MIN_QUEUE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSettings {
    /// Upper bound for a single notification sink call.
    pub delivery_timeout: Duration,
    /// The dispatcher re-reads the wall clock at least this often.
    pub max_sleep: Duration,
    /// How long in-flight fires may run after shutdown is requested.
    pub shutdown_grace: Duration,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(30),
            max_sleep: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// What happened when a reminder came due.
#[derive(Debug)]
pub enum FireOutcome {
    Delivered,
    /// The todo, its reminder or its owner went away before the fire.
    Dropped(ReminderError),
    Failed(ReminderError),
}

impl FireOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FireOutcome::Delivered => "delivered",
            FireOutcome::Dropped(_) => "dropped",
            FireOutcome::Failed(_) => "failed",
        }
    }
}

enum DispatcherCommand {
    Arm(ScheduledJob),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueEntry {
    trigger_at: DateTime<Utc>,
    token: JobToken,
    key: JobKey,
}

/// Everything a single fire needs, cloned into its task.
#[derive(Clone)]
pub(crate) struct FireContext {
    pub repository: Arc<dyn TodoRepository>,
    pub sink: Arc<dyn NotificationSink>,
    pub delivery_timeout: Duration,
}

/// Handle used by the CRUD layer and the daily sweep to arm and cancel reminders.
#[derive(Clone)]
pub struct ReminderScheduler {
    jobs: Arc<JobStore>,
    command_tx: mpsc::UnboundedSender<DispatcherCommand>,
}

impl ReminderScheduler {
    /// Arms the reminder of `todo_id` for `trigger_at`, replacing any pending one.
    ///
    /// A trigger in the past fires as soon as the dispatcher sees it.
    pub fn schedule(
        &self,
        todo_id: i64,
        trigger_at: DateTime<Utc>,
    ) -> Result<ScheduledJob, ReminderError> {
        let key = JobKey::for_todo(todo_id);
        let job = ScheduledJob::new(key, trigger_at);

        if let Some(previous) = self.jobs.replace(key, job) {
            debug!(
                "Replacing pending {} {} due at {}",
                key, previous.token, previous.trigger_at
            );
        }

        if self.command_tx.send(DispatcherCommand::Arm(job)).is_err() {
            self.jobs.remove_if_current(&key, job.token);
            return Err(ReminderError::SchedulerUnavailable);
        }

        metrics::record_reminder_scheduled();
        metrics::set_pending_reminders(self.jobs.len());
        info!("Scheduled {} at {}", key, trigger_at);
        Ok(job)
    }

    /// Cancels the pending reminder of `todo_id`. Returns false if there was none.
    pub fn cancel(&self, todo_id: i64) -> bool {
        let key = JobKey::for_todo(todo_id);
        match self.jobs.remove(&key) {
            Some(job) => {
                metrics::record_reminder_cancelled();
                metrics::set_pending_reminders(self.jobs.len());
                info!("Cancelled {} {} due at {}", key, job.token, job.trigger_at);
                true
            }
            None => false,
        }
    }

    /// Brings the pending reminder of `todo` in line with its current fields.
    ///
    /// Schedules when the todo has a reminder, cancels otherwise.
    pub fn schedule_todo(
        &self,
        todo: &Todo,
        today: NaiveDate,
    ) -> Result<Option<ScheduledJob>, ReminderError> {
        match todo_trigger_instant(todo, today) {
            Some(trigger_at) => self.schedule(todo.id, trigger_at).map(Some),
            None => {
                self.cancel(todo.id);
                Ok(None)
            }
        }
    }

    pub fn pending(&self, todo_id: i64) -> Option<ScheduledJob> {
        self.jobs.get(&JobKey::for_todo(todo_id))
    }

    pub fn pending_count(&self) -> usize {
        self.jobs.len()
    }

    /// Every pending job, earliest first.
    pub fn pending_jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.pending()
    }
}

/// Background loop that fires reminders at their trigger instant.
pub struct ReminderDispatcher {
    jobs: Arc<JobStore>,
    command_rx: mpsc::UnboundedReceiver<DispatcherCommand>,
    shutdown_token: CancellationToken,
    settings: ReminderSettings,
    fire_context: FireContext,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    in_flight: JoinSet<()>,
}

impl ReminderDispatcher {
    /// Main dispatch loop. Returns once `shutdown_token` is cancelled, or once
    /// every handle is gone and nothing is left to fire.
    pub async fn run(mut self) {
        info!("Starting reminder dispatcher");
        let mut commands_open = true;

        loop {
            let sleep_duration = self.time_until_next_due();
            let deadline = tokio::time::Instant::now() + sleep_duration;

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("Reminder dispatcher received shutdown signal");
                    break;
                }
                cmd = self.command_rx.recv(), if commands_open => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            debug!("All scheduler handles dropped");
                            commands_open = false;
                        }
                    }
                }
                Some(result) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = result {
                        error!("Reminder fire task panicked: {}", e);
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    self.fire_due_jobs();
                }
            }

            if !commands_open && self.queue.is_empty() && self.in_flight.is_empty() {
                break;
            }
        }

        self.shutdown().await;
        info!("Reminder dispatcher stopped");
    }

    fn handle_command(&mut self, cmd: DispatcherCommand) {
        match cmd {
            DispatcherCommand::Arm(job) => {
                // Already replaced or cancelled before we got to it.
                if !self.jobs.is_current(&job.key, job.token) {
                    return;
                }
                self.queue.push(Reverse(QueueEntry {
                    trigger_at: job.trigger_at,
                    token: job.token,
                    key: job.key,
                }));
                self.compact_queue();
            }
        }
    }

    fn time_until_next_due(&self) -> Duration {
        match self.queue.peek() {
            Some(Reverse(entry)) => (entry.trigger_at - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.settings.max_sleep),
            None => self.settings.max_sleep,
        }
    }

    fn fire_due_jobs(&mut self) {
        let now = Utc::now();

        while self
            .queue
            .peek()
            .is_some_and(|Reverse(entry)| entry.trigger_at <= now)
        {
            let Some(Reverse(entry)) = self.queue.pop() else {
                break;
            };

            // Remove before acting: a racing cancel or reschedule wins.
            let Some(job) = self.jobs.remove_if_current(&entry.key, entry.token) else {
                debug!("Skipping superseded {} {}", entry.key, entry.token);
                continue;
            };
            metrics::set_pending_reminders(self.jobs.len());

            let ctx = self.fire_context.clone();
            self.in_flight.spawn(async move {
                let outcome = fire(job, &ctx).await;
                log_outcome(&job, &outcome);
                metrics::record_reminder_fired(outcome.label());
            });
        }
    }

    /// Drops queue entries whose job was cancelled or replaced, once they
    /// make up most of the queue.
    fn compact_queue(&mut self) {
        let live = self.jobs.len();
        if self.queue.len() <= COMPACT_MIN_QUEUE_LEN || self.queue.len() <= live * 2 {
            return;
        }
        let before = self.queue.len();
        let jobs = &self.jobs;
        self.queue
            .retain(|Reverse(entry)| jobs.is_current(&entry.key, entry.token));
        debug!(
            "Compacted reminder queue from {} to {} entries",
            before,
            self.queue.len()
        );
    }

    async fn shutdown(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        info!(
            "Waiting up to {:?} for {} in-flight reminders",
            self.settings.shutdown_grace,
            self.in_flight.len()
        );

        let in_flight = &mut self.in_flight;
        let drain = async move { while in_flight.join_next().await.is_some() {} };
        if tokio::time::timeout(self.settings.shutdown_grace, drain)
            .await
            .is_err()
        {
            warn!(
                "Aborting {} reminders still in flight after shutdown grace",
                self.in_flight.len()
            );
            self.in_flight.abort_all();
        }
    }
}

/// Re-reads the todo and its owner, then hands the rendered reminder to the sink.
pub(crate) async fn fire(job: ScheduledJob, ctx: &FireContext) -> FireOutcome {
    let todo_id = job.key.todo_id();
    let repository = Arc::clone(&ctx.repository);

    let notification =
        match tokio::task::spawn_blocking(move || load_notification(repository.as_ref(), todo_id))
            .await
        {
            Ok(Ok(notification)) => notification,
            Ok(Err(e)) => return FireOutcome::Dropped(e),
            Err(e) => {
                return FireOutcome::Dropped(ReminderError::Repository(format!(
                    "lookup task failed: {}",
                    e
                )))
            }
        };

    let message = notification.render();
    let started = Instant::now();
    let result = tokio::time::timeout(ctx.delivery_timeout, ctx.sink.send(&message)).await;
    metrics::record_delivery_duration(started.elapsed());

    match result {
        Ok(Ok(())) => FireOutcome::Delivered,
        Ok(Err(e)) => FireOutcome::Failed(e.into()),
        Err(_) => FireOutcome::Failed(DeliveryError::Timeout(ctx.delivery_timeout).into()),
    }
}

fn load_notification(
    repository: &dyn TodoRepository,
    todo_id: i64,
) -> Result<ReminderNotification, ReminderError> {
    let todo = repository
        .get_todo(todo_id)
        .map_err(|e| ReminderError::Repository(e.to_string()))?
        .ok_or(ReminderError::TodoNotFound(todo_id))?;
    if !todo.wants_reminder() {
        return Err(ReminderError::ReminderDisabled(todo_id));
    }
    let user = repository
        .get_user(todo.user_id)
        .map_err(|e| ReminderError::Repository(e.to_string()))?
        .ok_or(ReminderError::UserNotFound(todo.user_id))?;
    Ok(ReminderNotification::new(&todo, &user))
}

fn log_outcome(job: &ScheduledJob, outcome: &FireOutcome) {
    match outcome {
        FireOutcome::Delivered => info!("Sent reminder {} due at {}", job.key, job.trigger_at),
        FireOutcome::Dropped(ReminderError::Repository(e)) => {
            error!("Dropped {}, repository read failed: {}", job.key, e)
        }
        FireOutcome::Dropped(reason) => info!("Dropped {}: {}", job.key, reason),
        FireOutcome::Failed(e) => warn!("Failed to deliver {}: {}", job.key, e),
    }
}

/// Create a dispatcher and the handle that feeds it.
pub fn create_scheduler(
    repository: Arc<dyn TodoRepository>,
    sink: Arc<dyn NotificationSink>,
    settings: ReminderSettings,
    shutdown_token: CancellationToken,
) -> (ReminderDispatcher, ReminderScheduler) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let jobs = Arc::new(JobStore::new());

    let dispatcher = ReminderDispatcher {
        jobs: Arc::clone(&jobs),
        command_rx,
        shutdown_token,
        fire_context: FireContext {
            repository,
            sink,
            delivery_timeout: settings.delivery_timeout,
        },
        settings,
        queue: BinaryHeap::new(),
        in_flight: JoinSet::new(),
    };

    let handle = ReminderScheduler { jobs, command_tx };

    (dispatcher, handle)
}
