use crate::notifications::DeliveryError;
use thiserror::Error;

/// Why a reminder-time string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("invalid time format {0:?}, expected H:MM AM|PM")]
    InvalidFormat(String),
    #[error("hour {0} is out of range 1-12")]
    HourOutOfRange(u32),
    #[error("minute {0} is out of range 0-59")]
    MinuteOutOfRange(u32),
}

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("invalid reminder time: {0}")]
    InvalidTimeFormat(#[from] TimeParseError),

    #[error("todo {0} not found")]
    TodoNotFound(i64),

    #[error("reminder of todo {0} is disabled")]
    ReminderDisabled(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("reminder scheduler is not running")]
    SchedulerUnavailable,
}
