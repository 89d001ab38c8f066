//! Threaded review comments.
//!
//! Comments are independent of the workflow state machine: a discussion can
//! continue on a post whose assignment is already terminal. A root comment
//! is its own thread (`thread_id == id`, set atomically at insert because
//! ids are client-generated); replies inherit the parent's thread id.
//! Rows are written once and later patched only for the resolution fields.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use greenlight_core::{
    ActorId, CommentId, NotificationDispatcher, NotificationEvent, PostId, StepId,
};

use crate::error::{EngineError, Result};
use crate::workflow::repository::Repository;

/// What kind of feedback a comment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Feedback,
    Approval,
    Rejection,
    RevisionRequest,
}

impl CommentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Approval => "approval",
            Self::Rejection => "rejection",
            Self::RevisionRequest => "revision_request",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feedback" => Some(Self::Feedback),
            "approval" => Some(Self::Approval),
            "rejection" => Some(Self::Rejection),
            "revision_request" => Some(Self::RevisionRequest),
            _ => None,
        }
    }
}

impl Default for CommentKind {
    fn default() -> Self {
        Self::Feedback
    }
}

impl fmt::Display for CommentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One review comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub actor_id: ActorId,
    pub body: String,
    pub kind: CommentKind,
    pub parent_id: Option<CommentId>,
    /// Root comments carry their own id here; replies carry the root's.
    pub thread_id: CommentId,
    pub is_resolved: bool,
    pub resolved_by: Option<ActorId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
    pub mentions: Vec<ActorId>,
    /// The workflow step the comment was left on, when relevant.
    pub step_id: Option<StepId>,
    pub created_at: DateTime<Utc>,
}

/// Optional fields for comment creation.
#[derive(Debug, Clone, Default)]
pub struct NewComment {
    pub parent_id: Option<CommentId>,
    pub kind: CommentKind,
    pub mentions: Vec<ActorId>,
    pub step_id: Option<StepId>,
}

impl NewComment {
    pub fn reply_to(parent_id: CommentId) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }
}

/// Manager for threaded review discussion.
pub struct CommentThreads {
    repo: Arc<dyn Repository>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl CommentThreads {
    pub fn new(repo: Arc<dyn Repository>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self { repo, notifier }
    }

    /// Create a comment, inheriting the parent's thread when replying.
    ///
    /// Mentioned actors are notified best-effort; a dispatch failure never
    /// fails the creation.
    pub async fn create(
        &self,
        post_id: PostId,
        actor_id: ActorId,
        body: impl Into<String>,
        options: NewComment,
    ) -> Result<Comment> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(EngineError::Validation("comment body is empty".into()));
        }

        let id = CommentId::generate();
        let thread_id = match &options.parent_id {
            Some(parent_id) => {
                let parent = self
                    .repo
                    .comment(parent_id)
                    .await?
                    .ok_or_else(|| EngineError::CommentNotFound(parent_id.clone()))?;
                parent.thread_id
            }
            None => id.clone(),
        };

        let comment = Comment {
            id,
            post_id: post_id.clone(),
            actor_id,
            body,
            kind: options.kind,
            parent_id: options.parent_id,
            thread_id,
            is_resolved: false,
            resolved_by: None,
            resolved_at: None,
            resolution: None,
            mentions: options.mentions.clone(),
            step_id: options.step_id,
            created_at: Utc::now(),
        };
        self.repo.insert_comment(&comment).await?;

        if !options.mentions.is_empty() {
            let event = NotificationEvent::Mentioned {
                post_id,
                comment_id: comment.id.clone(),
            };
            if let Err(e) = self.notifier.enqueue(&options.mentions, event).await {
                warn!(comment_id = %comment.id, "mention notification failed: {}", e);
            }
        }

        Ok(comment)
    }

    /// Mark a comment resolved. Idempotent: resolving twice overwrites the
    /// resolver, timestamp, and resolution text.
    pub async fn resolve(
        &self,
        comment_id: &CommentId,
        resolver_id: &ActorId,
        resolution: Option<String>,
    ) -> Result<Comment> {
        self.repo
            .resolve_comment(comment_id, resolver_id, Utc::now(), resolution.as_deref())
            .await?
            .ok_or_else(|| EngineError::CommentNotFound(comment_id.clone()))
    }

    /// All comments on a post, oldest first.
    pub async fn for_post(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        Ok(self.repo.comments_for_post(post_id).await?)
    }
}
