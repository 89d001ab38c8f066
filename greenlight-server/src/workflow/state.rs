//! Assignment state for the approval workflow machine.
//!
//! One live assignment per post tracks its progress through the workflow.
//! Statuses other than `Pending` are terminal: nothing advances a terminal
//! assignment, and a resubmission creates a fresh one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use greenlight_core::{ActorId, AssignmentId, PostId, StepId, WorkflowId};

/// A reviewer's decision on the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    RequestChanges,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestChanges => "request_changes",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an assignment is in its lifecycle.
///
/// `Approved` exists for wire compatibility with older records; the engine
/// itself only ever produces `Completed` when the final step clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Approved,
    Rejected,
    ChangesRequested,
    Completed,
}

impl AssignmentStatus {
    /// Everything except `Pending` is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::ChangesRequested => "changes_requested",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "changes_requested" => Some(Self::ChangesRequested),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded reviewer action on a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: StepId,
    pub action: ReviewAction,
    pub actor_id: ActorId,
    pub at: DateTime<Utc>,
}

/// Free-text a reviewer attaches to an action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewNote {
    pub comment: Option<String>,
    pub reason: Option<String>,
}

impl ReviewNote {
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// The live state machine instance for one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub post_id: PostId,
    pub workflow_id: WorkflowId,
    pub current_step_id: StepId,
    pub status: AssignmentStatus,
    pub step_history: Vec<StepRecord>,
    /// Optimistic-concurrency token; incremented on every successful write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// A fresh pending assignment at the given first step.
    pub fn new(
        post_id: PostId,
        workflow_id: WorkflowId,
        first_step_id: StepId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AssignmentId::generate(),
            post_id,
            workflow_id,
            current_step_id: first_step_id,
            status: AssignmentStatus::Pending,
            step_history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Number of approve records for the given step.
    pub fn approvals_for(&self, step_id: &StepId) -> u32 {
        self.step_history
            .iter()
            .filter(|r| &r.step_id == step_id && r.action == ReviewAction::Approve)
            .count() as u32
    }

    pub fn record(&mut self, action: ReviewAction, actor_id: ActorId, at: DateTime<Utc>) {
        self.step_history.push(StepRecord {
            step_id: self.current_step_id.clone(),
            action,
            actor_id,
            at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment() -> Assignment {
        Assignment::new(
            PostId::from("p1"),
            WorkflowId::from("w1"),
            StepId::from("s1"),
            Utc::now(),
        )
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!AssignmentStatus::Pending.is_terminal());
        assert!(AssignmentStatus::Approved.is_terminal());
        assert!(AssignmentStatus::Rejected.is_terminal());
        assert!(AssignmentStatus::ChangesRequested.is_terminal());
        assert!(AssignmentStatus::Completed.is_terminal());
    }

    #[test]
    fn approvals_count_only_approves_on_that_step() {
        let mut a = assignment();
        let now = Utc::now();
        a.record(ReviewAction::Approve, ActorId::from("alice"), now);
        a.record(ReviewAction::RequestChanges, ActorId::from("bob"), now);
        a.current_step_id = StepId::from("s2");
        a.record(ReviewAction::Approve, ActorId::from("carol"), now);

        assert_eq!(a.approvals_for(&StepId::from("s1")), 1);
        assert_eq!(a.approvals_for(&StepId::from("s2")), 1);
        assert_eq!(a.approvals_for(&StepId::from("s3")), 0);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            AssignmentStatus::Pending,
            AssignmentStatus::Approved,
            AssignmentStatus::Rejected,
            AssignmentStatus::ChangesRequested,
            AssignmentStatus::Completed,
        ] {
            assert_eq!(AssignmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AssignmentStatus::parse("bogus"), None);
    }
}
