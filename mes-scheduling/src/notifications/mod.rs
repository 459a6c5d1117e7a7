//! User-facing notifications raised by setup jobs.
//!
//! A setup job that exhausts its retries publishes one [`SetupNotification`]
//! and waits until an operator acknowledges it.

use crate::jobs::JobId;
use crate::recipe::RecipeId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Notification asking an operator to acknowledge a blocked setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupNotification {
    /// Blocked setup job.
    pub job: JobId,
    /// Production recipe the setup serves.
    pub target: RecipeId,
    /// Failed attempts so far.
    pub retries: u32,
    /// Message shown to the operator.
    pub message: String,
    /// When the notification was raised.
    pub raised_at: DateTime<Utc>,
}

/// Transport for acknowledgeable notifications.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    /// Publish a notification on behalf of `sender`.
    fn publish(&self, sender: JobId, notification: SetupNotification);

    /// Acknowledge every outstanding notification of `sender`.
    fn acknowledge_all(&self, sender: JobId);
}

/// Sink that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardNotifications;

impl NotificationSink for DiscardNotifications {
    fn publish(&self, _sender: JobId, _notification: SetupNotification) {}

    fn acknowledge_all(&self, _sender: JobId) {}
}

/// In-memory notification store.
#[derive(Debug, Default)]
pub struct InMemoryNotifications {
    pending: RwLock<HashMap<JobId, Vec<SetupNotification>>>,
}

impl InMemoryNotifications {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding notifications of a job.
    #[must_use]
    pub fn pending_for(&self, job: JobId) -> Vec<SetupNotification> {
        self.pending.read().get(&job).cloned().unwrap_or_default()
    }

    /// Number of outstanding notifications across all jobs.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.read().values().map(Vec::len).sum()
    }
}

impl NotificationSink for InMemoryNotifications {
    fn publish(&self, sender: JobId, notification: SetupNotification) {
        tracing::warn!(job = %sender, target = %notification.target, "{}", notification.message);
        self.pending.write().entry(sender).or_default().push(notification);
    }

    fn acknowledge_all(&self, sender: JobId) {
        if let Some(cleared) = self.pending.write().remove(&sender) {
            tracing::debug!(job = %sender, count = cleared.len(), "Notifications acknowledged");
        }
    }
}
