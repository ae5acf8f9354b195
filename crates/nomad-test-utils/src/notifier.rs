// Notifier that records instead of sending.

use std::sync::Mutex;

use async_trait::async_trait;

use nomad_core::notify::{Notification, Notifier};

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Records every notification, then reports failure for it.
    pub fn failing() -> Self {
        Self { sent: Mutex::default(), fail: true }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<Notification> {
        self.sent().into_iter().filter(|n| n.to == address).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(notification.clone());
        if self.fail {
            anyhow::bail!("mailer unavailable");
        }
        Ok(())
    }
}
