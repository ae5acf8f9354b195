// Notification collaborator.
//
// Email is a non-critical side channel: a send that fails or stalls is logged
// and dropped, and never changes the outcome of the operation that caused it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::options::NotificationOptions;

/// What happened, so delivery backends can pick a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PartnerApplicationReceived,
    PartnerApplicationAdminNotice,
    TeamCreated,
    TeamInvitation,
    TeamMemberRemoved,
    PaymentConfirmed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PartnerApplicationReceived => "partner_application_received",
            Self::PartnerApplicationAdminNotice => "partner_application_admin_notice",
            Self::TeamCreated => "team_created",
            Self::TeamInvitation => "team_invitation",
            Self::TeamMemberRemoved => "team_member_removed",
            Self::PaymentConfirmed => "payment_confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// A delivery backend (SMTP, an email API, a queue).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Discards everything. Used when no backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fire-and-forget dispatch with a bounded wait.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    options: NotificationOptions,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("enabled", &self.options.enabled)
            .field("timeout_ms", &self.options.timeout_ms)
            .finish()
    }
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, options: NotificationOptions) -> Self {
        Self { notifier, options }
    }

    pub fn disabled() -> Self {
        Self::new(
            Arc::new(NoopNotifier),
            NotificationOptions { enabled: false, ..Default::default() },
        )
    }

    /// Deliver one notification. Returns whether the backend accepted it;
    /// callers are free to ignore the answer.
    pub async fn deliver(&self, notification: Notification) -> bool {
        if !self.options.enabled {
            tracing::debug!(kind = notification.kind.as_str(), "notifications disabled, skipping");
            return false;
        }
        let timeout = Duration::from_millis(self.options.timeout_ms);
        match tokio::time::timeout(timeout, self.notifier.send(&notification)).await {
            Ok(Ok(())) => {
                tracing::debug!(kind = notification.kind.as_str(), to = %notification.to, "notification sent");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    kind = notification.kind.as_str(),
                    to = %notification.to,
                    error = %e,
                    "notification failed, continuing"
                );
                false
            }
            Err(_) => {
                tracing::warn!(
                    kind = notification.kind.as_str(),
                    to = %notification.to,
                    timeout_ms = self.options.timeout_ms,
                    "notification timed out, continuing"
                );
                false
            }
        }
    }

    /// Deliver several notifications in order, each independently.
    pub async fn deliver_all(&self, notifications: impl IntoIterator<Item = Notification>) -> usize {
        let mut sent = 0;
        for n in notifications {
            if self.deliver(n).await {
                sent += 1;
            }
        }
        sent
    }
}
