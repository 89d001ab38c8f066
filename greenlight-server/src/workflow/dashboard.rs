//! Reviewer-facing query surfaces: pending queue, stats, dashboard rows.

use serde::{Deserialize, Serialize};

use chrono::{DateTime, Utc};
use greenlight_core::{ActorId, PostId};

use crate::error::{EngineError, Result};
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::state::Assignment;

/// Aggregate review activity for one actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStats {
    /// Assignments currently waiting on this actor.
    pub awaiting_review: u64,
    pub approved: u64,
    pub rejected: u64,
    pub changes_requested: u64,
    /// All review decisions this actor has made.
    pub total_actions: u64,
}

/// One row of the reviewer dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRow {
    pub post_id: PostId,
    pub workflow_name: String,
    pub step_name: String,
    pub step_order: u32,
    pub total_steps: usize,
    pub approvals_recorded: u32,
    pub min_approvals: u32,
    pub pending_since: DateTime<Utc>,
    pub sla_hours: Option<u32>,
}

impl WorkflowEngine {
    /// Pending assignments whose current step's approver set contains the
    /// actor, optionally narrowed to one post.
    pub async fn pending_approvals(
        &self,
        actor_id: &ActorId,
        post_id: Option<&PostId>,
    ) -> Result<Vec<Assignment>> {
        let mut matched = Vec::new();
        for assignment in self.repo.pending_assignments().await? {
            if let Some(filter) = post_id {
                if &assignment.post_id != filter {
                    continue;
                }
            }
            let Some(workflow) = self.repo.workflow(&assignment.workflow_id).await? else {
                continue;
            };
            let Some(step) = workflow.step(&assignment.current_step_id) else {
                continue;
            };
            if self.directory.is_member(actor_id, &step.approver).await? {
                matched.push(assignment);
            }
        }
        Ok(matched)
    }

    /// Review activity totals for one actor.
    pub async fn approval_stats(&self, actor_id: &ActorId) -> Result<ApprovalStats> {
        let awaiting = self.pending_approvals(actor_id, None).await?.len() as u64;
        let counts = self.repo.action_counts(actor_id).await?;
        Ok(ApprovalStats {
            awaiting_review: awaiting,
            approved: counts.approved,
            rejected: counts.rejected,
            changes_requested: counts.changes_requested,
            total_actions: counts.approved + counts.rejected + counts.changes_requested,
        })
    }

    /// Dashboard rows for the actor's pending queue, oldest first.
    pub async fn approval_dashboard(&self, actor_id: &ActorId) -> Result<Vec<DashboardRow>> {
        let mut rows = Vec::new();
        for assignment in self.pending_approvals(actor_id, None).await? {
            let workflow = self
                .repo
                .workflow(&assignment.workflow_id)
                .await?
                .ok_or_else(|| {
                    EngineError::WorkflowNotFound(assignment.workflow_id.clone())
                })?;
            let step = workflow
                .step(&assignment.current_step_id)
                .ok_or_else(|| {
                    EngineError::Validation(format!(
                        "assignment {} points at step {} which is not in workflow {}",
                        assignment.id, assignment.current_step_id, workflow.id
                    ))
                })?;
            rows.push(DashboardRow {
                post_id: assignment.post_id.clone(),
                workflow_name: workflow.name.clone(),
                step_name: step.name.clone(),
                step_order: step.order,
                total_steps: workflow.total_steps(),
                approvals_recorded: assignment.approvals_for(&step.id),
                min_approvals: step.min_approvals,
                pending_since: assignment.updated_at,
                sla_hours: step.sla_hours,
            });
        }
        rows.sort_by(|a, b| a.pending_since.cmp(&b.pending_since));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use greenlight_core::{
        ApproverRef, ContentStore, InMemoryContentStore, InMemoryDirectory,
        NotificationDispatcher, Post, PostStatus, TracingDispatcher,
    };

    use crate::workflow::definition::{Step, Workflow, WorkflowScope};
    use crate::workflow::repository::InMemoryRepository;
    use crate::workflow::state::{ReviewAction, ReviewNote};

    async fn engine() -> WorkflowEngine {
        let content = Arc::new(InMemoryContentStore::new());
        for id in ["p1", "p2"] {
            content
                .insert(Post {
                    id: PostId::from(id),
                    author_id: ActorId::from("author"),
                    team_id: None,
                    content: "draft".to_string(),
                    media_urls: vec![],
                    scheduled_at: None,
                    status: PostStatus::Draft,
                })
                .await;
        }
        let directory = Arc::new(InMemoryDirectory::new());
        directory
            .add_actor(ActorId::from("ed1"), &["editor"], &[])
            .await;
        directory
            .add_actor(ActorId::from("ed2"), &["editor"], &[])
            .await;
        directory
            .add_actor(ActorId::from("lawyer"), &["legal"], &[])
            .await;

        let engine = WorkflowEngine::new(
            Arc::new(InMemoryRepository::new()),
            content as Arc<dyn ContentStore>,
            directory,
            Arc::new(TracingDispatcher) as Arc<dyn NotificationDispatcher>,
        );
        engine
            .create_workflow(Workflow::new(
                ActorId::from("owner"),
                "standard review",
                WorkflowScope::Global,
                vec![
                    Step::new(1, "editorial", ApproverRef::Role("editor".into()))
                        .with_min_approvals(2),
                    Step::new(2, "legal", ApproverRef::Role("legal".into())),
                ],
                chrono::Utc::now(),
            ))
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn pending_approvals_match_current_step_approver() {
        let e = engine().await;
        e.ensure_assignment(&PostId::from("p1"), &ActorId::from("author"), None)
            .await
            .unwrap();
        e.ensure_assignment(&PostId::from("p2"), &ActorId::from("author"), None)
            .await
            .unwrap();

        // Both posts sit on the editorial step.
        let pending = e
            .pending_approvals(&ActorId::from("ed1"), None)
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
        assert!(e
            .pending_approvals(&ActorId::from("lawyer"), None)
            .await
            .unwrap()
            .is_empty());

        // Narrowed to one post.
        let one = e
            .pending_approvals(&ActorId::from("ed1"), Some(&PostId::from("p2")))
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].post_id, PostId::from("p2"));
    }

    #[tokio::test]
    async fn queue_moves_to_legal_after_editorial_clears() {
        let e = engine().await;
        e.ensure_assignment(&PostId::from("p1"), &ActorId::from("author"), None)
            .await
            .unwrap();
        for actor in ["ed1", "ed2"] {
            e.advance(
                &PostId::from("p1"),
                &ActorId::from(actor),
                ReviewAction::Approve,
                ReviewNote::default(),
            )
            .await
            .unwrap();
        }

        assert!(e
            .pending_approvals(&ActorId::from("ed1"), None)
            .await
            .unwrap()
            .is_empty());
        let legal = e
            .pending_approvals(&ActorId::from("lawyer"), None)
            .await
            .unwrap();
        assert_eq!(legal.len(), 1);
    }

    #[tokio::test]
    async fn stats_combine_queue_and_history() {
        let e = engine().await;
        e.ensure_assignment(&PostId::from("p1"), &ActorId::from("author"), None)
            .await
            .unwrap();
        e.ensure_assignment(&PostId::from("p2"), &ActorId::from("author"), None)
            .await
            .unwrap();
        e.advance(
            &PostId::from("p1"),
            &ActorId::from("ed1"),
            ReviewAction::Reject,
            ReviewNote::reason("off brand"),
        )
        .await
        .unwrap();

        let stats = e.approval_stats(&ActorId::from("ed1")).await.unwrap();
        assert_eq!(stats.awaiting_review, 1); // p2 still pending editorial
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.approved, 0);
        assert_eq!(stats.total_actions, 1);
    }

    #[tokio::test]
    async fn dashboard_rows_carry_step_progress() {
        let e = engine().await;
        e.ensure_assignment(&PostId::from("p1"), &ActorId::from("author"), None)
            .await
            .unwrap();
        e.advance(
            &PostId::from("p1"),
            &ActorId::from("ed1"),
            ReviewAction::Approve,
            ReviewNote::default(),
        )
        .await
        .unwrap();

        let rows = e.approval_dashboard(&ActorId::from("ed2")).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.workflow_name, "standard review");
        assert_eq!(row.step_name, "editorial");
        assert_eq!(row.step_order, 1);
        assert_eq!(row.total_steps, 2);
        assert_eq!(row.approvals_recorded, 1);
        assert_eq!(row.min_approvals, 2);
    }
}
