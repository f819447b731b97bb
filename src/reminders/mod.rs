//! Deferred reminder delivery.
//!
//! A [`ReminderScheduler`] handle arms and cancels at most one pending reminder
//! per todo. The [`ReminderDispatcher`] loop fires them through a
//! [`crate::notifications::NotificationSink`], and the [`DailySweep`] re-arms
//! everything due today so a restart loses nothing.

mod error;
mod job_store;
mod runtime;
mod scheduler;
mod sweep;
mod time_parser;

pub use error::{ReminderError, TimeParseError};
pub use job_store::{JobKey, JobStore, JobToken, ScheduledJob};
pub use runtime::ReminderRuntime;
pub use scheduler::{
    create_scheduler, FireOutcome, ReminderDispatcher, ReminderScheduler, ReminderSettings,
};
pub use sweep::{next_sweep_at, DailySweep, SweepReport, SweepSettings};
pub use time_parser::{todo_trigger_instant, trigger_instant, trigger_instant_in, ReminderTime};
