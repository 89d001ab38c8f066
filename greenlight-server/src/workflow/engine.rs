//! The step advancement engine.
//!
//! The engine is the boundary between the pure transition function and the
//! impure world: it loads state, runs the transition, persists the result
//! with an optimistic version check, appends the audit entry, and interprets
//! effects against the collaborators. Content-store failures propagate;
//! notification failures are logged and swallowed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use greenlight_core::{
    ActorId, ApproverDirectory, ContentStore, NotificationDispatcher, NotificationEvent, PostId,
    PostPatch, PostStatus, StepId, WorkflowId,
};

use crate::error::{EngineError, Result};
use crate::history::{ActionDetails, HistoryAction, HistoryEntry, HistoryQuery};
use crate::workflow::definition::{resolve_default, Workflow};
use crate::workflow::repository::{Repository, RepositoryError};
use crate::workflow::state::{Assignment, ReviewAction, ReviewNote};
use crate::workflow::transition::{transition, Effect};

/// Bound on optimistic-concurrency retries before giving up.
const MAX_CAS_ATTEMPTS: u32 = 5;

/// Coordinates assignments, advancement, history, and side effects.
pub struct WorkflowEngine {
    pub(crate) repo: Arc<dyn Repository>,
    pub(crate) content: Arc<dyn ContentStore>,
    pub(crate) directory: Arc<dyn ApproverDirectory>,
    pub(crate) notifier: Arc<dyn NotificationDispatcher>,
}

impl WorkflowEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        content: Arc<dyn ContentStore>,
        directory: Arc<dyn ApproverDirectory>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            repo,
            content,
            directory,
            notifier,
        }
    }

    /// Validate and store a workflow definition.
    pub async fn create_workflow(&self, workflow: Workflow) -> Result<Workflow> {
        workflow.validate()?;
        self.repo.insert_workflow(&workflow).await?;
        info!(workflow_id = %workflow.id, name = %workflow.name, "workflow created");
        Ok(workflow)
    }

    /// Find or create the live assignment for a post.
    ///
    /// Idempotent: an existing non-terminal assignment is returned
    /// unchanged. Creation resolves the workflow (explicit id, or default
    /// resolution against the post's author and team), starts at the first
    /// step, records a `Submitted` history entry, flips the post to
    /// pending-approval, and notifies the first step's approvers.
    pub async fn ensure_assignment(
        &self,
        post_id: &PostId,
        author_id: &ActorId,
        workflow_id: Option<&WorkflowId>,
    ) -> Result<Assignment> {
        if let Some(existing) = self.repo.active_assignment(post_id).await? {
            return Ok(existing);
        }

        let post = self.content.get_post(post_id).await?;
        let workflow = match workflow_id {
            Some(id) => self
                .repo
                .workflow(id)
                .await?
                .filter(|w| w.is_active)
                .ok_or_else(|| EngineError::WorkflowNotFound(id.clone()))?,
            None => {
                let candidates = self.repo.active_workflows().await?;
                resolve_default(&candidates, author_id, post.team_id.as_ref())
                    .cloned()
                    .ok_or_else(|| EngineError::NoApplicableWorkflow(post_id.clone()))?
            }
        };
        let first_step_id = workflow
            .first_step()
            .map(|s| s.id.clone())
            .ok_or_else(|| {
                EngineError::Validation(format!("workflow '{}' has no steps", workflow.name))
            })?;

        let now = Utc::now();
        let assignment = Assignment::new(
            post_id.clone(),
            workflow.id.clone(),
            first_step_id.clone(),
            now,
        );
        match self.repo.insert_assignment(&assignment).await {
            Ok(()) => {}
            Err(RepositoryError::DuplicateAssignment(_)) => {
                // Lost a creation race; the winner's row is the live one.
                return self
                    .repo
                    .active_assignment(post_id)
                    .await?
                    .ok_or_else(|| EngineError::AssignmentNotFound(post_id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        self.repo
            .append_history(&HistoryEntry::new(
                post_id.clone(),
                author_id.clone(),
                HistoryAction::Submitted,
                None,
                now,
            ))
            .await?;
        self.content
            .update_post(post_id, PostPatch::status(PostStatus::PendingApproval))
            .await?;
        self.notify_step_approvers(&workflow, &first_step_id, post_id)
            .await;

        info!(
            post_id = %post_id,
            workflow_id = %workflow.id,
            "assignment created at first step"
        );
        Ok(assignment)
    }

    /// Apply one reviewer action to the post's live assignment.
    ///
    /// The read-transition-write cycle is protected by the repository's
    /// version check: on conflict the engine reloads and replays, so two
    /// concurrent approvals on one step settle into exactly two records and
    /// at most one advancement.
    pub async fn advance(
        &self,
        post_id: &PostId,
        actor_id: &ActorId,
        action: ReviewAction,
        note: ReviewNote,
    ) -> Result<Assignment> {
        let mut attempt = 0;
        let (outcome, workflow) = loop {
            attempt += 1;
            let assignment = self
                .repo
                .active_assignment(post_id)
                .await?
                .ok_or_else(|| EngineError::AssignmentNotFound(post_id.clone()))?;
            let workflow = self
                .repo
                .workflow(&assignment.workflow_id)
                .await?
                .ok_or_else(|| EngineError::WorkflowNotFound(assignment.workflow_id.clone()))?;

            let expected_version = assignment.version;
            let mut outcome =
                transition(assignment, &workflow, action, actor_id, &note, Utc::now())?;
            outcome.assignment.version = expected_version + 1;

            match self
                .repo
                .update_assignment(&outcome.assignment, expected_version)
                .await
            {
                Ok(()) => break (outcome, workflow),
                Err(err @ RepositoryError::Conflict(_)) => {
                    if attempt >= MAX_CAS_ATTEMPTS {
                        return Err(err.into());
                    }
                    warn!(post_id = %post_id, attempt, "assignment version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        let details = ActionDetails::from_parts(note.comment.clone(), note.reason.clone());
        self.repo
            .append_history(&HistoryEntry::new(
                post_id.clone(),
                actor_id.clone(),
                action.into(),
                details,
                Utc::now(),
            ))
            .await?;

        self.execute_effects(post_id, &workflow, &outcome.effects)
            .await?;

        info!(
            post_id = %post_id,
            actor = %actor_id,
            action = %action,
            status = %outcome.assignment.status,
            "workflow step advanced"
        );
        Ok(outcome.assignment)
    }

    /// Read the audit history.
    pub async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        Ok(self.repo.history(query).await?)
    }

    async fn execute_effects(
        &self,
        post_id: &PostId,
        workflow: &Workflow,
        effects: &[Effect],
    ) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::MarkPost(status) => {
                    self.content
                        .update_post(post_id, PostPatch::status(*status))
                        .await?;
                }
                Effect::NotifyApprovers { step_id } => {
                    self.notify_step_approvers(workflow, step_id, post_id).await;
                }
                Effect::NotifyAuthor(event) => {
                    self.notify_author(post_id, event.clone()).await;
                }
            }
        }
        Ok(())
    }

    /// Best-effort fan-out to a step's approver set.
    async fn notify_step_approvers(&self, workflow: &Workflow, step_id: &StepId, post_id: &PostId) {
        let Some(step) = workflow.step(step_id) else {
            warn!(%step_id, workflow_id = %workflow.id, "cannot notify approvers of unknown step");
            return;
        };
        let recipients = match self.directory.members(&step.approver).await {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(post_id = %post_id, "approver lookup failed: {}", e);
                return;
            }
        };
        if recipients.is_empty() {
            return;
        }
        let event = NotificationEvent::ApprovalRequested {
            post_id: post_id.clone(),
            workflow_id: workflow.id.clone(),
            step_id: step.id.clone(),
            step_name: step.name.clone(),
        };
        if let Err(e) = self.notifier.enqueue(&recipients, event).await {
            warn!(post_id = %post_id, "approval notification failed: {}", e);
        }
    }

    /// Best-effort notification to the post's author.
    async fn notify_author(&self, post_id: &PostId, event: NotificationEvent) {
        let author = match self.content.get_post(post_id).await {
            Ok(post) => post.author_id,
            Err(e) => {
                warn!(post_id = %post_id, "author lookup for notification failed: {}", e);
                return;
            }
        };
        if let Err(e) = self.notifier.enqueue(&[author], event).await {
            warn!(post_id = %post_id, "author notification failed: {}", e);
        }
    }
}
