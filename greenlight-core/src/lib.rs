//! Shared domain types and external-collaborator traits for greenlight.
//!
//! The server crate owns the approval workflow engine; this crate holds the
//! pieces both sides of that boundary agree on: identifiers, the post model,
//! and the traits for the collaborators the engine consumes but does not
//! own (content store, notification dispatcher, approver directory).

pub mod content;
pub mod directory;
pub mod ids;
pub mod notify;
pub mod post;

pub use content::{ContentStore, ContentStoreError, InMemoryContentStore};
pub use directory::{ApproverDirectory, ApproverRef, DirectoryError, InMemoryDirectory};
pub use ids::{
    ActorId, AssignmentId, CommentId, HistoryId, PostId, RevisionId, StepId, TeamId, WorkflowId,
};
pub use notify::{
    NotificationDispatcher, NotificationEvent, NotifyError, RecordingDispatcher, TracingDispatcher,
};
pub use post::{Post, PostPatch, PostStatus};
