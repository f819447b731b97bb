//! Todo Reminder Server Library
//!
//! Exposes the reminder engine, the todo store and the supporting modules
//! for the binary and for integration tests.

pub mod config;
pub mod notifications;
pub mod reminders;
pub mod server;
pub mod sqlite_persistence;
pub mod todo_store;
pub mod todos;

// Re-export commonly used types for convenience
pub use reminders::{ReminderRuntime, ReminderScheduler, ReminderTime};
pub use todo_store::{SqliteTodoStore, TodoRepository, TodoStore};
pub use todos::TodoManager;
