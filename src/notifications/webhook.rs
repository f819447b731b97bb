//! Delivery over HTTP: each reminder is POSTed as JSON to a configured URL,
//! typically a mail relay.

use super::models::OutgoingMessage;
use super::sink::{DeliveryError, NotificationSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub struct WebhookNotificationSink {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotificationSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!("Webhook accepted reminder for {} ({})", message.to, status);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
