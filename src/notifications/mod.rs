//! Reminder rendering and delivery.

mod models;
mod sink;
mod webhook;

pub use models::{OutgoingMessage, ReminderNotification, REMINDER_SUBJECT};
pub use sink::{DeliveryError, LogNotificationSink, NotificationSink};
pub use webhook::WebhookNotificationSink;

#[cfg(any(test, feature = "mock"))]
pub use sink::MockNotificationSink;
