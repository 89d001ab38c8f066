//! Immutable content revision snapshots.
//!
//! A revision captures whichever of the post's content fields the caller
//! chose to snapshot. Rows are append-only: restoring never rewrites an old
//! revision, it applies the snapshot's fields onto the live post and appends
//! a fresh revision pointing back at the one it came from.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use greenlight_core::{ActorId, ContentStore, PostId, PostPatch, RevisionId};

use crate::error::{EngineError, Result};
use crate::workflow::repository::Repository;

/// Reason recorded on the revision a restore appends.
pub const RESTORED_REASON: &str = "restored_version";

/// Point-in-time capture of a post's editable fields.
///
/// Absent fields were not captured and are left untouched on restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionSnapshot {
    pub content: Option<String>,
    pub media_urls: Option<Vec<String>>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl RevisionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.media_urls.is_none() && self.scheduled_at.is_none()
    }

    fn as_patch(&self) -> PostPatch {
        PostPatch {
            content: self.content.clone(),
            media_urls: self.media_urls.clone(),
            scheduled_at: self.scheduled_at,
            status: None,
        }
    }
}

/// One immutable revision row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub post_id: PostId,
    pub actor_id: ActorId,
    pub snapshot: RevisionSnapshot,
    /// Set when this revision was produced by restoring another one.
    pub restored_from: Option<RevisionId>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Manager for recording and restoring revisions.
pub struct RevisionLog {
    repo: Arc<dyn Repository>,
    content: Arc<dyn ContentStore>,
}

impl RevisionLog {
    pub fn new(repo: Arc<dyn Repository>, content: Arc<dyn ContentStore>) -> Self {
        Self { repo, content }
    }

    /// Append a revision row.
    pub async fn record(
        &self,
        post_id: PostId,
        actor_id: ActorId,
        snapshot: RevisionSnapshot,
        restored_from: Option<RevisionId>,
        reason: Option<String>,
    ) -> Result<Revision> {
        let revision = Revision {
            id: RevisionId::generate(),
            post_id,
            actor_id,
            snapshot,
            restored_from,
            reason,
            created_at: Utc::now(),
        };
        self.repo.insert_revision(&revision).await?;
        Ok(revision)
    }

    /// Restore a revision onto the live post.
    ///
    /// Applies only the fields present in the snapshot, then appends a new
    /// revision with `restored_from` pointing at the source. A missing
    /// revision (or one belonging to another post) is NotFound, and in that
    /// case nothing is written anywhere.
    pub async fn restore(
        &self,
        post_id: &PostId,
        revision_id: &RevisionId,
        actor_id: &ActorId,
    ) -> Result<Revision> {
        let source = self
            .repo
            .revision(revision_id)
            .await?
            .filter(|r| &r.post_id == post_id)
            .ok_or_else(|| EngineError::RevisionNotFound(revision_id.clone()))?;

        self.content
            .update_post(post_id, source.snapshot.as_patch())
            .await?;

        self.record(
            post_id.clone(),
            actor_id.clone(),
            source.snapshot.clone(),
            Some(source.id),
            Some(RESTORED_REASON.to_string()),
        )
        .await
    }

    /// All revisions of a post, oldest first.
    pub async fn for_post(&self, post_id: &PostId) -> Result<Vec<Revision>> {
        Ok(self.repo.revisions_for_post(post_id).await?)
    }
}
