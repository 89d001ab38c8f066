//! Error taxonomy for the approval engine.
//!
//! Three caller-visible classes: not-found, validation, and persistence.
//! The API layer maps each class to a distinct status; the bulk coordinator
//! records the class per failed item instead of propagating. Notification
//! failures never appear here - they are logged and swallowed at the
//! dispatch site.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use greenlight_core::{
    CommentId, ContentStoreError, DirectoryError, PostId, RevisionId, WorkflowId,
};

use crate::workflow::repository::RepositoryError;

/// A `Result` alias with [`enum@EngineError`] as the error type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No non-terminal assignment exists for the post.
    #[error("no active assignment for post {0}")]
    AssignmentNotFound(PostId),

    /// The explicitly named workflow does not exist or is inactive.
    #[error("workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    /// Default resolution found no workflow covering the post.
    #[error("no workflow applies to post {0}")]
    NoApplicableWorkflow(PostId),

    #[error("comment {0} not found")]
    CommentNotFound(CommentId),

    #[error("revision {0} not found")]
    RevisionNotFound(RevisionId),

    #[error("post {0} not found")]
    PostNotFound(PostId),

    /// Malformed input: empty comment body, invalid workflow definition, etc.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("repository failure: {0}")]
    Repository(#[from] RepositoryError),

    #[error("content store failure: {0}")]
    ContentStore(String),

    #[error("approver directory failure: {0}")]
    Directory(String),
}

/// Coarse classification used by the bulk coordinator and the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    Validation,
    Persistence,
}

impl EngineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AssignmentNotFound(_)
            | Self::WorkflowNotFound(_)
            | Self::NoApplicableWorkflow(_)
            | Self::CommentNotFound(_)
            | Self::RevisionNotFound(_)
            | Self::PostNotFound(_) => FailureKind::NotFound,
            Self::Validation(_) => FailureKind::Validation,
            Self::Repository(_) | Self::ContentStore(_) | Self::Directory(_) => {
                FailureKind::Persistence
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == FailureKind::NotFound
    }
}

impl From<ContentStoreError> for EngineError {
    fn from(err: ContentStoreError) -> Self {
        match err {
            ContentStoreError::NotFound(id) => Self::PostNotFound(id),
            ContentStoreError::Unavailable(msg) => Self::ContentStore(msg),
        }
    }
}

impl From<DirectoryError> for EngineError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Unavailable(msg) => Self::Directory(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_the_taxonomy() {
        assert_eq!(
            EngineError::AssignmentNotFound(PostId::from("p")).kind(),
            FailureKind::NotFound
        );
        assert_eq!(
            EngineError::Validation("bad".into()).kind(),
            FailureKind::Validation
        );
        assert_eq!(
            EngineError::ContentStore("down".into()).kind(),
            FailureKind::Persistence
        );
    }

    #[test]
    fn content_not_found_maps_to_post_not_found() {
        let err: EngineError = ContentStoreError::NotFound(PostId::from("p1")).into();
        assert!(matches!(err, EngineError::PostNotFound(_)));
        assert!(err.is_not_found());
    }
}
