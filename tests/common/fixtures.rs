#![allow(dead_code)]

use super::sink::RecordingSink;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use todo_reminder_server::notifications::NotificationSink;
use todo_reminder_server::reminders::{
    DailySweep, ReminderRuntime, ReminderScheduler, ReminderSettings, SweepSettings,
};
use todo_reminder_server::todo_store::{SqliteTodoStore, TodoRepository, TodoStore};
use todo_reminder_server::todos::{CreateTodoRequest, TodoManager};

/// How long a test waits for a reminder that should fire.
pub const FIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// How long a test waits to be reasonably sure nothing else fires.
pub const QUIET_PERIOD: Duration = Duration::from_millis(600);

/// A running reminder runtime over a fresh database.
pub struct TestHarness {
    pub store: Arc<SqliteTodoStore>,
    pub sink: Arc<RecordingSink>,
    pub manager: TodoManager,
    runtime: ReminderRuntime,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestHarness {
    /// Starts the runtime with the startup sweep disabled.
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> Self {
        Self::spawn_with(SweepSettings {
            on_startup: false,
            ..Default::default()
        })
    }

    pub fn spawn_with(sweep_settings: SweepSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteTodoStore::new(temp_dir.path().join("todos.db"))
                .expect("Failed to open todo store"),
        );
        let sink = Arc::new(RecordingSink::default());

        let repository: Arc<dyn TodoRepository> = store.clone();
        let notification_sink: Arc<dyn NotificationSink> = sink.clone();
        let runtime = ReminderRuntime::start(
            repository,
            notification_sink,
            ReminderSettings {
                delivery_timeout: Duration::from_secs(2),
                max_sleep: Duration::from_millis(250),
                shutdown_grace: Duration::from_secs(1),
            },
            sweep_settings,
            tokio_util::sync::CancellationToken::new(),
        );

        let todo_store: Arc<dyn TodoStore> = store.clone();
        let manager = TodoManager::new(todo_store, runtime.scheduler());

        Self {
            store,
            sink,
            manager,
            runtime,
            _temp_dir: temp_dir,
        }
    }

    pub fn scheduler(&self) -> ReminderScheduler {
        self.runtime.scheduler()
    }

    pub fn sweep(&self, settings: SweepSettings) -> DailySweep {
        let repository: Arc<dyn TodoRepository> = self.store.clone();
        DailySweep::new(repository, self.scheduler(), settings)
    }

    pub async fn shutdown(self) {
        self.runtime.shutdown().await;
    }
}

/// A request for a todo due today with a reminder at `reminder_time`.
pub fn todo_due_today(title: &str, reminder_time: &str) -> CreateTodoRequest {
    CreateTodoRequest {
        title: title.to_string(),
        description: Some(format!("{} details", title)),
        due_date: Some(today()),
        priority: Some("high".to_string()),
        reminder: true,
        reminder_time: Some(reminder_time.to_string()),
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// A request for a todo due tomorrow with a 9:00 AM reminder, so it stays pending.
pub fn todo_due_tomorrow(title: &str) -> CreateTodoRequest {
    CreateTodoRequest {
        title: title.to_string(),
        due_date: today().succ_opt(),
        reminder: true,
        reminder_time: Some("9:00 AM".to_string()),
        ..Default::default()
    }
}
