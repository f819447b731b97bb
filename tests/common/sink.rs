use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use todo_reminder_server::notifications::{DeliveryError, NotificationSink, OutgoingMessage};

/// Keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(OutgoingMessage, DateTime<Utc>)>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    /// When each message reached the sink, in arrival order.
    pub fn sent_times(&self) -> Vec<DateTime<Utc>> {
        self.sent.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Messages whose body mentions `needle`.
    pub fn count_mentioning(&self, needle: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m.body.contains(needle))
            .count()
    }

    /// Polls until at least `expected` messages arrived or `timeout` elapsed.
    /// Returns the final count.
    pub async fn wait_for(&self, expected: usize, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let count = self.count();
            if count >= expected || tokio::time::Instant::now() >= deadline {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((message.clone(), Utc::now()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
