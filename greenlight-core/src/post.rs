//! The post model as seen by the approval engine.
//!
//! Posts are owned by the content platform; the engine reads them to resolve
//! workflows and writes back status changes and revision restores through
//! the [`ContentStore`](crate::content::ContentStore) collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ActorId, PostId, TeamId};

/// Moderation status of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    NeedsRevision,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::NeedsRevision => "needs_revision",
        };
        write!(f, "{}", s)
    }
}

/// A scheduled social-media post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: ActorId,
    pub team_id: Option<TeamId>,
    pub content: String,
    pub media_urls: Vec<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: PostStatus,
}

/// Partial update applied to a post.
///
/// Only the fields that are `Some` are written; everything else is left
/// untouched. This is the shape both status reflection and revision
/// restores go through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPatch {
    pub content: Option<String>,
    pub media_urls: Option<Vec<String>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: Option<PostStatus>,
}

impl PostPatch {
    /// A patch that only changes the moderation status.
    pub fn status(status: PostStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.media_urls.is_none()
            && self.scheduled_at.is_none()
            && self.status.is_none()
    }

    /// Apply this patch to a post in place.
    pub fn apply(&self, post: &mut Post) {
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(media_urls) = &self.media_urls {
            post.media_urls = media_urls.clone();
        }
        if let Some(scheduled_at) = self.scheduled_at {
            post.scheduled_at = Some(scheduled_at);
        }
        if let Some(status) = self.status {
            post.status = status;
        }
    }
}
