use super::models::OutgoingMessage;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by receiver with status {status}")]
    Rejected { status: u16 },
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Delivers rendered reminder messages.
///
/// Called concurrently from many fire tasks; implementations must be safe to
/// share.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        info!(
            "[{}] to={} subject={:?} ({} bytes)",
            self.name(),
            message.to,
            message.subject,
            message.body.len()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
