//! Repository abstraction for engine persistence.
//!
//! One trait covers the five persisted shapes: workflow definitions, live
//! assignments, the append-only history, review comments, and revision
//! snapshots. Implementations provide different backends (in-memory,
//! SQLite) without changing the engine's coordination logic.
//!
//! The assignment write path is a compare-and-swap: `update_assignment`
//! succeeds only when the stored row still carries `expected_version`. The
//! engine reloads and replays its transition on [`RepositoryError::Conflict`],
//! which is what keeps concurrent approvals on one step from double-advancing
//! or losing a record.

mod memory;
mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use greenlight_core::{ActorId, AssignmentId, CommentId, PostId, RevisionId, WorkflowId};

use crate::comments::Comment;
use crate::history::{ActionCounts, HistoryEntry, HistoryQuery};
use crate::revisions::Revision;
use crate::workflow::definition::Workflow;
use crate::workflow::state::Assignment;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage failure during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored assignment no longer carries the expected version.
    #[error("version conflict updating assignment {0}")]
    Conflict(AssignmentId),

    /// The exactly-one-live-assignment invariant would be violated.
    #[error("post {0} already has an active assignment")]
    DuplicateAssignment(PostId),
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Storage backend for the approval engine.
#[async_trait]
pub trait Repository: Send + Sync {
    // =========================================================================
    // Workflow definitions
    // =========================================================================

    /// Store a workflow definition. Definitions are validated by the caller.
    async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError>;

    async fn workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>, RepositoryError>;

    /// All active workflow definitions, for default resolution.
    async fn active_workflows(&self) -> Result<Vec<Workflow>, RepositoryError>;

    // =========================================================================
    // Assignments
    // =========================================================================

    /// Insert a fresh assignment. Fails with
    /// [`RepositoryError::DuplicateAssignment`] if the post already has a
    /// non-terminal one.
    async fn insert_assignment(&self, assignment: &Assignment) -> Result<(), RepositoryError>;

    /// The post's non-terminal assignment, if any.
    async fn active_assignment(
        &self,
        post_id: &PostId,
    ) -> Result<Option<Assignment>, RepositoryError>;

    /// Compare-and-swap write: succeeds only when the stored row still has
    /// `expected_version`; the caller supplies the row with its version
    /// already bumped.
    async fn update_assignment(
        &self,
        assignment: &Assignment,
        expected_version: u64,
    ) -> Result<(), RepositoryError>;

    /// All assignments currently pending review, for the dashboard.
    async fn pending_assignments(&self) -> Result<Vec<Assignment>, RepositoryError>;

    // =========================================================================
    // History (append-only)
    // =========================================================================

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), RepositoryError>;

    /// Filtered read, newest first, limited per the query.
    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, RepositoryError>;

    /// Per-action totals for one actor.
    async fn action_counts(&self, actor_id: &ActorId) -> Result<ActionCounts, RepositoryError>;

    // =========================================================================
    // Comments
    // =========================================================================

    async fn insert_comment(&self, comment: &Comment) -> Result<(), RepositoryError>;

    async fn comment(&self, id: &CommentId) -> Result<Option<Comment>, RepositoryError>;

    /// Overwrite the resolution fields. Returns the updated comment, or
    /// `None` if it does not exist. Idempotent by design.
    async fn resolve_comment(
        &self,
        id: &CommentId,
        resolved_by: &ActorId,
        resolved_at: DateTime<Utc>,
        resolution: Option<&str>,
    ) -> Result<Option<Comment>, RepositoryError>;

    /// All comments on a post, oldest first.
    async fn comments_for_post(&self, post_id: &PostId) -> Result<Vec<Comment>, RepositoryError>;

    // =========================================================================
    // Revisions (append-only)
    // =========================================================================

    async fn insert_revision(&self, revision: &Revision) -> Result<(), RepositoryError>;

    async fn revision(&self, id: &RevisionId) -> Result<Option<Revision>, RepositoryError>;

    /// All revisions of a post, oldest first.
    async fn revisions_for_post(&self, post_id: &PostId)
        -> Result<Vec<Revision>, RepositoryError>;
}
