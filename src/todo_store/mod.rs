//! Persistence of users and todos.
//!
//! The reminder engine only ever reads through [`TodoRepository`]; the
//! write side lives in [`TodoStore`] and is driven by the CRUD layer.

mod models;
mod schema;
mod sqlite_todo_store;

pub use models::{NewTodo, Priority, Todo, TodoFilter, User};
pub use schema::TODO_VERSIONED_SCHEMAS;
pub use sqlite_todo_store::SqliteTodoStore;

use anyhow::Result;
use chrono::NaiveDate;

/// Read access needed by the reminder scheduler and the daily sweep.
pub trait TodoRepository: Send + Sync {
    /// Returns Ok(None) if the todo does not exist.
    fn get_todo(&self, todo_id: i64) -> Result<Option<Todo>>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    /// Todos due on `date` that have the reminder flag set.
    fn list_due_reminders(&self, date: NaiveDate) -> Result<Vec<Todo>>;
}

/// Full CRUD access to users and todos.
pub trait TodoStore: TodoRepository {
    /// Creates a new user and returns the user id.
    fn create_user(&self, username: &str, email: &str) -> Result<i64>;

    fn update_user_email(&self, user_id: i64, email: &str) -> Result<bool>;

    /// Deletes the user together with all of their todos.
    /// Returns false if the user did not exist.
    fn delete_user(&self, user_id: i64) -> Result<bool>;

    fn create_todo(&self, todo: &NewTodo) -> Result<Todo>;

    /// Overwrites every mutable field of an existing todo.
    /// Returns false if no row matched.
    fn update_todo(&self, todo: &Todo) -> Result<bool>;

    /// Returns false if no row matched.
    fn delete_todo(&self, todo_id: i64) -> Result<bool>;

    fn list_todos(&self, user_id: i64, filter: TodoFilter) -> Result<Vec<Todo>>;

    /// Deletes every todo owned by the user, returning the ids that were removed.
    fn delete_user_todos(&self, user_id: i64) -> Result<Vec<i64>>;
}
