use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LowStock,
    JobFailed,
    ChainWarning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Fire-and-forget sink for user-facing alerts.
///
/// Delivery failures are the sink's problem; callers never wait on or react
/// to the outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, kind: NotificationKind, message: String);
}

/// Emits notifications as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, kind: NotificationKind, message: String) {
        tracing::warn!(?kind, %message, "notification");
    }
}

/// Records notifications for inspection.
#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    pub async fn count(&self, kind: NotificationKind) -> usize {
        self.sent
            .read()
            .await
            .iter()
            .filter(|n| n.kind == kind)
            .count()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, kind: NotificationKind, message: String) {
        self.sent.write().await.push(Notification {
            kind,
            message,
            at: Utc::now(),
        });
    }
}
