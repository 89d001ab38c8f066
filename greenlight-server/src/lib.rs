//! Approval workflow engine for the greenlight moderation platform.
//!
//! A post submitted for review gets exactly one live [`Assignment`] - the
//! state machine tracking its progress through the ordered steps of a
//! [`Workflow`]. Reviewer actions advance or terminate the assignment via a
//! pure transition function; side effects (post status, notifications) are
//! interpreted at the engine boundary, and every action is recorded in an
//! append-only history. Threaded review comments and immutable content
//! revisions live alongside the state machine.

pub mod comments;
pub mod config;
pub mod error;
pub mod history;
pub mod revisions;
pub mod workflow;

pub use comments::{Comment, CommentKind, CommentThreads, NewComment};
pub use config::EngineConfig;
pub use error::{EngineError, FailureKind, Result};
pub use history::{ActionCounts, ActionDetails, HistoryAction, HistoryEntry, HistoryQuery};
pub use revisions::{Revision, RevisionLog, RevisionSnapshot};
pub use workflow::bulk::{BulkDecision, BulkFailure, BulkOutcome};
pub use workflow::dashboard::{ApprovalStats, DashboardRow};
pub use workflow::definition::{Step, Workflow, WorkflowScope};
pub use workflow::engine::WorkflowEngine;
pub use workflow::repository::{
    InMemoryRepository, Repository, RepositoryError, SqliteRepository,
};
pub use workflow::state::{Assignment, AssignmentStatus, ReviewAction, ReviewNote, StepRecord};
