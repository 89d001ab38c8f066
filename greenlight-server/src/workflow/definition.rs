//! Workflow definitions and default-workflow resolution.
//!
//! Definitions are read-mostly: the engine never mutates them, it only
//! resolves which workflow covers a post and walks its ordered steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use greenlight_core::{ActorId, ApproverRef, StepId, TeamId, WorkflowId};

use crate::error::EngineError;

/// Which posts a workflow covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "filter", rename_all = "snake_case")]
pub enum WorkflowScope {
    /// Covers every post.
    Global,
    /// Covers posts belonging to the team.
    Team(TeamId),
    /// Covers posts authored by the user.
    User(ActorId),
}

/// One approval stage within a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    /// 1-based position; orders within a workflow are exactly `1..=len`.
    pub order: u32,
    pub name: String,
    pub approver: ApproverRef,
    pub min_approvals: u32,
    /// Advisory only; consumed by an external escalation scheduler.
    pub auto_escalate_after_hours: Option<u32>,
    /// Optional steps advance on the first approval regardless of
    /// `min_approvals`.
    pub is_optional: bool,
    /// Advisory only.
    pub sla_hours: Option<u32>,
}

impl Step {
    pub fn new(order: u32, name: impl Into<String>, approver: ApproverRef) -> Self {
        Self {
            id: StepId::generate(),
            order,
            name: name.into(),
            approver,
            min_approvals: 1,
            auto_escalate_after_hours: None,
            is_optional: false,
            sla_hours: None,
        }
    }

    pub fn with_min_approvals(mut self, min_approvals: u32) -> Self {
        self.min_approvals = min_approvals;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    /// Approvals needed before the step clears.
    pub fn approval_threshold(&self) -> u32 {
        if self.is_optional {
            1
        } else {
            self.min_approvals
        }
    }
}

/// An ordered sequence of approval steps applied to matching posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub owner_id: ActorId,
    pub name: String,
    pub scope: WorkflowScope,
    pub is_active: bool,
    pub steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(
        owner_id: ActorId,
        name: impl Into<String>,
        scope: WorkflowScope,
        steps: Vec<Step>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WorkflowId::generate(),
            owner_id,
            name: name.into(),
            scope,
            is_active: true,
            steps,
            created_at: now,
        }
    }

    /// Validate the definition invariants.
    ///
    /// Orders must be exactly `1..=len` - contiguity makes the engine's
    /// `order + 1` lookup total - and every step needs `min_approvals >= 1`.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.steps.is_empty() {
            return Err(EngineError::Validation(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }
        for (i, step) in self.steps.iter().enumerate() {
            let expected = (i + 1) as u32;
            if step.order != expected {
                return Err(EngineError::Validation(format!(
                    "workflow '{}': step '{}' has order {}, expected {}",
                    self.name, step.name, step.order, expected
                )));
            }
            if step.min_approvals < 1 {
                return Err(EngineError::Validation(format!(
                    "workflow '{}': step '{}' requires min_approvals >= 1",
                    self.name, step.name
                )));
            }
        }
        Ok(())
    }

    pub fn first_step(&self) -> Option<&Step> {
        self.steps.iter().min_by_key(|s| s.order)
    }

    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// The step that follows the given order, if any.
    pub fn step_after(&self, order: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.order == order + 1)
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Whether this workflow covers a post by the given author/team.
    fn covers(&self, author: &ActorId, team: Option<&TeamId>) -> bool {
        match &self.scope {
            WorkflowScope::Global => true,
            WorkflowScope::Team(t) => team == Some(t),
            WorkflowScope::User(u) => u == author,
        }
    }

    /// Lower value wins during default resolution.
    fn scope_rank(&self) -> u8 {
        match self.scope {
            WorkflowScope::User(_) => 0,
            WorkflowScope::Team(_) => 1,
            WorkflowScope::Global => 2,
        }
    }
}

/// Resolve the default workflow for a post.
///
/// Precedence: user-scoped (matching the author) over team-scoped (matching
/// the post's team) over global; ties within a tier go to the newest
/// `created_at`. Inactive workflows and workflows without steps are never
/// candidates.
pub fn resolve_default<'a>(
    workflows: &'a [Workflow],
    author: &ActorId,
    team: Option<&TeamId>,
) -> Option<&'a Workflow> {
    workflows
        .iter()
        .filter(|w| w.is_active && !w.steps.is_empty() && w.covers(author, team))
        .min_by(|a, b| {
            a.scope_rank()
                .cmp(&b.scope_rank())
                .then(b.created_at.cmp(&a.created_at))
        })
}
