use chrono::NaiveDate;
use serde::Deserialize;

/// Fields accepted when creating a todo. Times are user-entered, e.g. "7:30 PM".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<String>,
    #[serde(default)]
    pub reminder: bool,
    pub reminder_time: Option<String>,
}

/// Partial update; fields left as None keep their current value.
///
/// An empty `reminder_time` clears the stored time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<String>,
    pub completed: Option<bool>,
    pub reminder: Option<bool>,
    pub reminder_time: Option<String>,
}
