use super::models::{CreateTodoRequest, UpdateTodoRequest};
use crate::reminders::{ReminderScheduler, ReminderTime, TimeParseError};
use crate::todo_store::{NewTodo, Priority, Todo, TodoFilter, TodoStore, User};
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("todo {0} not found")]
    NotFound(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid reminder time: {0}")]
    InvalidTimeFormat(#[from] TimeParseError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type TodoResult<T> = Result<T, TodoError>;

/// Todo and account operations that keep pending reminders in sync with storage.
pub struct TodoManager {
    store: Arc<dyn TodoStore>,
    scheduler: ReminderScheduler,
}

impl TodoManager {
    pub fn new(store: Arc<dyn TodoStore>, scheduler: ReminderScheduler) -> Self {
        Self { store, scheduler }
    }

    pub fn create_user(&self, username: &str, email: &str) -> TodoResult<User> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(TodoError::InvalidInput("username cannot be empty".to_string()));
        }
        if !email.contains('@') {
            return Err(TodoError::InvalidInput(format!("invalid email {:?}", email)));
        }

        let user_id = self.store.create_user(username, email)?;
        self.store
            .get_user(user_id)?
            .ok_or(TodoError::UserNotFound(user_id))
    }

    pub fn get_user(&self, user_id: i64) -> TodoResult<User> {
        self.store
            .get_user(user_id)?
            .ok_or(TodoError::UserNotFound(user_id))
    }

    /// Pending reminders pick the new address up when they fire.
    pub fn update_email(&self, user_id: i64, email: &str) -> TodoResult<()> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(TodoError::InvalidInput(format!("invalid email {:?}", email)));
        }
        if !self.store.update_user_email(user_id, email)? {
            return Err(TodoError::UserNotFound(user_id));
        }
        Ok(())
    }

    /// Deletes the account and every todo it owns, cancelling their reminders.
    pub fn delete_user(&self, user_id: i64) -> TodoResult<()> {
        self.get_user(user_id)?;
        let removed = self.store.delete_user_todos(user_id)?;
        self.cancel_all(&removed);
        self.store.delete_user(user_id)?;
        info!("Deleted user {} and {} todos", user_id, removed.len());
        Ok(())
    }

    /// Deletes every todo of the user but keeps the account.
    /// Returns how many todos were removed.
    pub fn reset_account(&self, user_id: i64) -> TodoResult<usize> {
        self.get_user(user_id)?;
        let removed = self.store.delete_user_todos(user_id)?;
        self.cancel_all(&removed);
        info!("Reset account of user {}, removed {} todos", user_id, removed.len());
        Ok(removed.len())
    }

    pub fn create_todo(&self, user_id: i64, request: CreateTodoRequest) -> TodoResult<Todo> {
        self.get_user(user_id)?;

        let title = validate_title(&request.title)?;
        let priority = parse_priority(request.priority.as_deref())?.unwrap_or_default();
        let reminder_time = parse_reminder_time(request.reminder_time.as_deref())?;
        require_time_for_reminder(request.reminder, reminder_time)?;

        let todo = self.store.create_todo(&NewTodo {
            user_id,
            title,
            description: request.description,
            due_date: request.due_date,
            priority,
            reminder: request.reminder,
            reminder_time,
        })?;

        self.sync_reminder(&todo);
        Ok(todo)
    }

    pub fn get_todo(&self, user_id: i64, todo_id: i64) -> TodoResult<Todo> {
        self.store
            .get_todo(todo_id)?
            .filter(|todo| todo.user_id == user_id)
            .ok_or(TodoError::NotFound(todo_id))
    }

    pub fn list_todos(&self, user_id: i64, filter: TodoFilter) -> TodoResult<Vec<Todo>> {
        Ok(self.store.list_todos(user_id, filter)?)
    }

    /// Applies a partial update. The pending reminder is rescheduled or
    /// cancelled only when the reminder flag, its time or the due date changed.
    pub fn update_todo(
        &self,
        user_id: i64,
        todo_id: i64,
        request: UpdateTodoRequest,
    ) -> TodoResult<Todo> {
        let mut todo = self.get_todo(user_id, todo_id)?;
        let reminder_before = reminder_fields(&todo);

        if let Some(title) = &request.title {
            todo.title = validate_title(title)?;
        }
        if let Some(priority) = parse_priority(request.priority.as_deref())? {
            todo.priority = priority;
        }
        if let Some(time) = &request.reminder_time {
            todo.reminder_time = parse_reminder_time(Some(time.as_str()))?;
        }
        if request.description.is_some() {
            todo.description = request.description;
        }
        if request.due_date.is_some() {
            todo.due_date = request.due_date;
        }
        if let Some(completed) = request.completed {
            todo.completed = completed;
        }
        if let Some(reminder) = request.reminder {
            todo.reminder = reminder;
        }
        require_time_for_reminder(todo.reminder, todo.reminder_time)?;

        if !self.store.update_todo(&todo)? {
            return Err(TodoError::NotFound(todo_id));
        }

        // Untouched reminder fields keep the pending job, and a fired one stays fired.
        if reminder_fields(&todo) != reminder_before {
            self.sync_reminder(&todo);
        }
        Ok(todo)
    }

    pub fn delete_todo(&self, user_id: i64, todo_id: i64) -> TodoResult<()> {
        self.get_todo(user_id, todo_id)?;
        if !self.store.delete_todo(todo_id)? {
            return Err(TodoError::NotFound(todo_id));
        }
        self.scheduler.cancel(todo_id);
        Ok(())
    }

    fn sync_reminder(&self, todo: &Todo) {
        // The todo is already stored; the next sweep re-arms it if this fails.
        if let Err(e) = self.scheduler.schedule_todo(todo, Local::now().date_naive()) {
            warn!("Could not schedule reminder for todo {}: {}", todo.id, e);
        }
    }

    fn cancel_all(&self, todo_ids: &[i64]) {
        for todo_id in todo_ids {
            self.scheduler.cancel(*todo_id);
        }
    }
}

fn validate_title(title: &str) -> TodoResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TodoError::InvalidInput("title cannot be empty".to_string()));
    }
    Ok(title.to_string())
}

fn parse_priority(priority: Option<&str>) -> TodoResult<Option<Priority>> {
    match priority {
        None => Ok(None),
        Some(value) => Priority::parse(value)
            .map(Some)
            .ok_or_else(|| TodoError::InvalidInput(format!("unknown priority {:?}", value))),
    }
}

fn reminder_fields(todo: &Todo) -> (bool, Option<ReminderTime>, Option<NaiveDate>) {
    (todo.reminder, todo.reminder_time, todo.due_date)
}

fn require_time_for_reminder(reminder: bool, time: Option<ReminderTime>) -> TodoResult<()> {
    if reminder && time.is_none() {
        return Err(TodoError::InvalidInput(
            "a reminder needs a reminder_time".to_string(),
        ));
    }
    Ok(())
}

fn parse_reminder_time(time: Option<&str>) -> TodoResult<Option<ReminderTime>> {
    match time.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Ok(Some(ReminderTime::parse(value)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::LogNotificationSink;
    use crate::reminders::{create_scheduler, trigger_instant, ReminderSettings};
    use crate::todo_store::SqliteTodoStore;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        manager: TodoManager,
        scheduler: ReminderScheduler,
        shutdown: CancellationToken,
        _temp_dir: TempDir,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteTodoStore::new(temp_dir.path().join("todos.db")).unwrap());
        let shutdown = CancellationToken::new();
        let (dispatcher, scheduler) = create_scheduler(
            store.clone(),
            Arc::new(LogNotificationSink),
            ReminderSettings::default(),
            shutdown.clone(),
        );
        tokio::spawn(dispatcher.run());
        Fixture {
            manager: TodoManager::new(store, scheduler.clone()),
            scheduler,
            shutdown,
            _temp_dir: temp_dir,
        }
    }

    fn future_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2099, 5, 1).unwrap()
    }

    fn reminder_request(title: &str, time: &str) -> CreateTodoRequest {
        CreateTodoRequest {
            title: title.to_string(),
            due_date: Some(future_date()),
            reminder: true,
            reminder_time: Some(time.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_todo_with_reminder_schedules_it() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();

        let todo = f
            .manager
            .create_todo(user.id, reminder_request("Dentist", "7:30 PM"))
            .unwrap();

        assert_eq!(todo.priority, Priority::Low);
        assert_eq!(todo.reminder_time, Some(ReminderTime::new(19, 30).unwrap()));
        let job = f.scheduler.pending(todo.id).unwrap();
        assert_eq!(
            job.trigger_at,
            trigger_instant(future_date(), ReminderTime::new(19, 30).unwrap())
        );
    }

    #[tokio::test]
    async fn test_invalid_reminder_time_fails_and_schedules_nothing() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();

        let result = f
            .manager
            .create_todo(user.id, reminder_request("Dentist", "13:00 PM"));

        assert!(matches!(
            result,
            Err(TodoError::InvalidTimeFormat(TimeParseError::HourOutOfRange(13)))
        ));
        assert!(f.manager.list_todos(user.id, TodoFilter::All).unwrap().is_empty());
        assert_eq!(f.scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_create_todo_validates_title_priority_and_owner() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();

        let blank = CreateTodoRequest {
            title: "   ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            f.manager.create_todo(user.id, blank),
            Err(TodoError::InvalidInput(_))
        ));

        let urgent = CreateTodoRequest {
            title: "Taxes".to_string(),
            priority: Some("urgent".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.manager.create_todo(user.id, urgent),
            Err(TodoError::InvalidInput(_))
        ));

        assert!(matches!(
            f.manager.create_todo(user.id + 1, reminder_request("Ghost", "9:00 AM")),
            Err(TodoError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_reschedules_and_disabling_cancels() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();
        let todo = f
            .manager
            .create_todo(user.id, reminder_request("Dentist", "7:30 PM"))
            .unwrap();
        let first = f.scheduler.pending(todo.id).unwrap();

        let updated = f
            .manager
            .update_todo(
                user.id,
                todo.id,
                UpdateTodoRequest {
                    reminder_time: Some("8:15 AM".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.reminder_time, Some(ReminderTime::new(8, 15).unwrap()));

        let second = f.scheduler.pending(todo.id).unwrap();
        assert_ne!(first.token, second.token);
        assert_eq!(
            second.trigger_at,
            trigger_instant(future_date(), ReminderTime::new(8, 15).unwrap())
        );
        assert_eq!(f.scheduler.pending_count(), 1);

        f.manager
            .update_todo(
                user.id,
                todo.id,
                UpdateTodoRequest {
                    reminder: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(f.scheduler.pending(todo.id).is_none());
    }

    #[tokio::test]
    async fn test_update_with_invalid_time_leaves_todo_untouched() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();
        let todo = f
            .manager
            .create_todo(user.id, reminder_request("Dentist", "7:30 PM"))
            .unwrap();
        let job = f.scheduler.pending(todo.id).unwrap();

        let result = f.manager.update_todo(
            user.id,
            todo.id,
            UpdateTodoRequest {
                title: Some("Renamed".to_string()),
                reminder_time: Some("25:00".to_string()),
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(TodoError::InvalidTimeFormat(_))));
        assert_eq!(f.manager.get_todo(user.id, todo.id).unwrap().title, "Dentist");
        assert_eq!(f.scheduler.pending(todo.id), Some(job));
    }

    #[tokio::test]
    async fn test_other_users_todos_are_not_found() {
        let f = fixture();
        let ada = f.manager.create_user("ada", "ada@example.com").unwrap();
        let bob = f.manager.create_user("bob", "bob@example.com").unwrap();
        let todo = f
            .manager
            .create_todo(ada.id, reminder_request("Private", "9:00 AM"))
            .unwrap();

        assert!(matches!(
            f.manager.get_todo(bob.id, todo.id),
            Err(TodoError::NotFound(_))
        ));
        assert!(matches!(
            f.manager.delete_todo(bob.id, todo.id),
            Err(TodoError::NotFound(_))
        ));
        assert!(f.scheduler.pending(todo.id).is_some());
    }

    #[tokio::test]
    async fn test_delete_todo_cancels_reminder() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();
        let todo = f
            .manager
            .create_todo(user.id, reminder_request("Dentist", "7:30 PM"))
            .unwrap();

        f.manager.delete_todo(user.id, todo.id).unwrap();

        assert!(f.scheduler.pending(todo.id).is_none());
        assert!(matches!(
            f.manager.get_todo(user.id, todo.id),
            Err(TodoError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_and_delete_account_cancel_every_reminder() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();
        for title in ["One", "Two", "Three"] {
            f.manager
                .create_todo(user.id, reminder_request(title, "9:00 AM"))
                .unwrap();
        }
        assert_eq!(f.scheduler.pending_count(), 3);

        assert_eq!(f.manager.reset_account(user.id).unwrap(), 3);
        assert_eq!(f.scheduler.pending_count(), 0);
        assert!(f.manager.get_user(user.id).is_ok());

        f.manager
            .create_todo(user.id, reminder_request("Four", "9:00 AM"))
            .unwrap();
        f.manager.delete_user(user.id).unwrap();
        assert_eq!(f.scheduler.pending_count(), 0);
        assert!(matches!(
            f.manager.get_user(user.id),
            Err(TodoError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_completion() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();
        let todo = f
            .manager
            .create_todo(
                user.id,
                CreateTodoRequest {
                    title: "Laundry".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        f.manager
            .create_todo(
                user.id,
                CreateTodoRequest {
                    title: "Dishes".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        f.manager
            .update_todo(
                user.id,
                todo.id,
                UpdateTodoRequest {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        let pending = f.manager.list_todos(user.id, TodoFilter::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "Dishes");
        let complete = f.manager.list_todos(user.id, TodoFilter::Complete).unwrap();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].title, "Laundry");
    }

    #[tokio::test]
    async fn test_user_validation_and_email_update() {
        let f = fixture();
        assert!(matches!(
            f.manager.create_user("", "ada@example.com"),
            Err(TodoError::InvalidInput(_))
        ));
        assert!(matches!(
            f.manager.create_user("ada", "not-an-email"),
            Err(TodoError::InvalidInput(_))
        ));

        let user = f.manager.create_user("ada", "ada@example.com").unwrap();
        f.manager.update_email(user.id, "ada@new.example.com").unwrap();
        assert_eq!(f.manager.get_user(user.id).unwrap().email, "ada@new.example.com");
        assert!(matches!(
            f.manager.update_email(user.id + 1, "x@example.com"),
            Err(TodoError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_without_reminder_changes_keeps_pending_job() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();
        let todo = f
            .manager
            .create_todo(user.id, reminder_request("Dentist", "7:30 PM"))
            .unwrap();
        let job = f.scheduler.pending(todo.id).unwrap();

        f.manager
            .update_todo(
                user.id,
                todo.id,
                UpdateTodoRequest {
                    title: Some("Dentist appointment".to_string()),
                    completed: Some(true),
                    priority: Some("high".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(f.scheduler.pending(todo.id), Some(job));
    }

    #[tokio::test]
    async fn test_reminder_without_time_is_rejected() {
        let f = fixture();
        let user = f.manager.create_user("ada", "ada@example.com").unwrap();

        let no_time = CreateTodoRequest {
            title: "Dentist".to_string(),
            reminder: true,
            reminder_time: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.manager.create_todo(user.id, no_time),
            Err(TodoError::InvalidInput(_))
        ));
        assert!(f.manager.list_todos(user.id, TodoFilter::All).unwrap().is_empty());

        let todo = f
            .manager
            .create_todo(user.id, reminder_request("Dentist", "7:30 PM"))
            .unwrap();
        let job = f.scheduler.pending(todo.id).unwrap();
        let result = f.manager.update_todo(
            user.id,
            todo.id,
            UpdateTodoRequest {
                reminder_time: Some(String::new()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(TodoError::InvalidInput(_))));
        assert_eq!(f.scheduler.pending(todo.id), Some(job));

        // Clearing the time together with the flag is fine
        f.manager
            .update_todo(
                user.id,
                todo.id,
                UpdateTodoRequest {
                    reminder: Some(false),
                    reminder_time: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(f.scheduler.pending(todo.id).is_none());
    }
}
