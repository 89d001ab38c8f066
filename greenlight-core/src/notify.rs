//! Notification dispatcher collaborator.
//!
//! Dispatch is fire-and-forget: the engine hands recipients and an event to
//! the dispatcher and moves on. Delivery transport (email, push, webhooks)
//! is not this system's concern. Callers are expected to log and swallow
//! dispatch failures; a lost notification must never fail a review action.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::ids::{ActorId, CommentId, PostId, StepId, WorkflowId};

/// Events fanned out to recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A step is waiting on the recipient's review.
    ApprovalRequested {
        post_id: PostId,
        workflow_id: WorkflowId,
        step_id: StepId,
        step_name: String,
    },
    /// The post cleared its final approval step.
    PostApproved { post_id: PostId },
    /// A reviewer rejected the post.
    PostRejected {
        post_id: PostId,
        reason: Option<String>,
    },
    /// A reviewer asked for changes.
    ChangesRequested {
        post_id: PostId,
        reason: Option<String>,
    },
    /// The recipient was mentioned in a review comment.
    Mentioned {
        post_id: PostId,
        comment_id: CommentId,
    },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification dispatch failed: {0}")]
    Dispatch(String),
}

/// Best-effort notification fan-out.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn enqueue(
        &self,
        recipients: &[ActorId],
        event: NotificationEvent,
    ) -> Result<(), NotifyError>;
}

/// Dispatcher that only logs. The default when no transport is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn enqueue(
        &self,
        recipients: &[ActorId],
        event: NotificationEvent,
    ) -> Result<(), NotifyError> {
        info!(recipients = recipients.len(), ?event, "notification enqueued");
        Ok(())
    }
}

/// Dispatcher that records everything it is handed, for assertions in tests.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<(Vec<ActorId>, NotificationEvent)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(Vec<ActorId>, NotificationEvent)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn enqueue(
        &self,
        recipients: &[ActorId],
        event: NotificationEvent,
    ) -> Result<(), NotifyError> {
        self.sent.lock().await.push((recipients.to_vec(), event));
        Ok(())
    }
}
