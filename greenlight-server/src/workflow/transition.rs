//! Pure step-advancement transition.
//!
//! Given an assignment, its workflow, and a reviewer action, produce the new
//! assignment plus effects to execute. This function has NO side effects -
//! all I/O is described as data and interpreted by the engine, which keeps
//! the advancement rules testable without a store or collaborators.

use chrono::{DateTime, Utc};

use greenlight_core::{ActorId, NotificationEvent, PostStatus, StepId};

use crate::error::EngineError;
use crate::workflow::definition::Workflow;
use crate::workflow::state::{Assignment, AssignmentStatus, ReviewAction, ReviewNote};

/// Side effects produced by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Reflect the outcome onto the post via the content store.
    MarkPost(PostStatus),
    /// Tell the step's approver set their review is wanted.
    NotifyApprovers { step_id: StepId },
    /// Tell the post's author about a terminal outcome.
    NotifyAuthor(NotificationEvent),
}

/// Result of a transition: the updated assignment and effects to run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub assignment: Assignment,
    pub effects: Vec<Effect>,
}

/// Apply one reviewer action to a pending assignment.
///
/// Approve appends a step record and advances when the current step's
/// approval threshold is met - to the next step if one exists, otherwise to
/// `Completed`. Reject and request-changes are terminal for this cycle.
pub fn transition(
    mut assignment: Assignment,
    workflow: &Workflow,
    action: ReviewAction,
    actor_id: &ActorId,
    note: &ReviewNote,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, EngineError> {
    if assignment.is_terminal() {
        return Err(EngineError::Validation(format!(
            "assignment {} is already {}",
            assignment.id, assignment.status
        )));
    }
    let current = workflow
        .step(&assignment.current_step_id)
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "assignment {} points at step {} which is not in workflow {}",
                assignment.id, assignment.current_step_id, workflow.id
            ))
        })?
        .clone();

    assignment.record(action, actor_id.clone(), now);
    assignment.updated_at = now;

    let effects = match action {
        ReviewAction::Approve => {
            let count = assignment.approvals_for(&current.id);
            if count >= current.approval_threshold() {
                match workflow.step_after(current.order) {
                    Some(next) => {
                        assignment.current_step_id = next.id.clone();
                        vec![Effect::NotifyApprovers {
                            step_id: next.id.clone(),
                        }]
                    }
                    None => {
                        assignment.status = AssignmentStatus::Completed;
                        vec![
                            Effect::MarkPost(PostStatus::Approved),
                            Effect::NotifyAuthor(NotificationEvent::PostApproved {
                                post_id: assignment.post_id.clone(),
                            }),
                        ]
                    }
                }
            } else {
                // Threshold not met yet; stay on the step.
                vec![]
            }
        }
        ReviewAction::Reject => {
            assignment.status = AssignmentStatus::Rejected;
            vec![
                Effect::MarkPost(PostStatus::Rejected),
                Effect::NotifyAuthor(NotificationEvent::PostRejected {
                    post_id: assignment.post_id.clone(),
                    reason: note.reason.clone(),
                }),
            ]
        }
        ReviewAction::RequestChanges => {
            assignment.status = AssignmentStatus::ChangesRequested;
            vec![
                Effect::MarkPost(PostStatus::NeedsRevision),
                Effect::NotifyAuthor(NotificationEvent::ChangesRequested {
                    post_id: assignment.post_id.clone(),
                    reason: note.reason.clone(),
                }),
            ]
        }
    };

    Ok(TransitionOutcome { assignment, effects })
}
