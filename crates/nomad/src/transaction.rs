// Transaction scope: one storage transaction plus the notifications that
// must only go out once it has committed.
//
// Operations return `Result<Decision<T>>`. The outer `Result` carries
// infrastructure failures and rolls the transaction back. The inner
// `Decision` carries business denials, which still commit: a denial may have
// flipped a lapsed subscription or removed an expired token on the way, and
// those side effects are part of the answer.

use nomad_core::db::adapter::{Adapter, TransactionAdapter};
use nomad_core::error::{ApiError, ErrorCode, NomadError, Result};
use nomad_core::notify::{Notification, NotificationDispatcher};

use crate::context::NomadContext;
use crate::internal_adapter::InternalAdapter;

/// A business outcome: the value, or the denial reported to the caller.
pub type Decision<T> = std::result::Result<T, ApiError>;

/// A denial with the code's default message.
pub(crate) fn deny<T>(code: ErrorCode) -> Result<Decision<T>> {
    Ok(Err(ApiError::new(code)))
}

pub struct TransactionScope {
    tx: Box<dyn TransactionAdapter>,
    dispatcher: NotificationDispatcher,
    after_commit: Vec<Notification>,
}

impl std::fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("tx", &self.tx)
            .field("after_commit", &self.after_commit.len())
            .finish()
    }
}

impl TransactionScope {
    pub async fn begin(ctx: &NomadContext) -> Result<Self> {
        Ok(Self {
            tx: ctx.adapter.begin_transaction().await?,
            dispatcher: ctx.notifications.clone(),
            after_commit: Vec::new(),
        })
    }

    pub fn db(&self) -> &dyn Adapter {
        self.tx.as_adapter()
    }

    pub fn store(&self) -> InternalAdapter<'_> {
        InternalAdapter::new(self.tx.as_adapter())
    }

    /// Queue a notification for after commit. Dropped on rollback.
    pub fn notify_after_commit(&mut self, notification: Notification) {
        self.after_commit.push(notification);
    }

    /// Commit on any business outcome, roll back on infrastructure failure.
    pub async fn settle<T>(self, outcome: Result<Decision<T>>) -> Result<T> {
        match outcome {
            Ok(decision) => {
                self.tx.commit().await?;
                self.dispatcher.deliver_all(self.after_commit).await;
                decision.map_err(NomadError::Api)
            }
            Err(e) => {
                if let Err(rollback_err) = self.tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }
}
