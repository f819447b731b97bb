//! Todo and account operations for the (external) HTTP layer.

mod manager;
mod models;

pub use manager::{TodoError, TodoManager, TodoResult};
pub use models::{CreateTodoRequest, UpdateTodoRequest};
