//! Bulk operations over the engine.
//!
//! One decision applied across many posts with per-item isolation: every
//! failure is caught, classified, and recorded, and the remaining items keep
//! going. The coordinator itself never fails - partial failure is data, not
//! an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use greenlight_core::{ActorId, PostId};

use crate::error::FailureKind;
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::state::{ReviewAction, ReviewNote};

/// The two decisions a bulk operation supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkDecision {
    Approve,
    Reject,
}

impl From<BulkDecision> for ReviewAction {
    fn from(decision: BulkDecision) -> Self {
        match decision {
            BulkDecision::Approve => Self::Approve,
            BulkDecision::Reject => Self::Reject,
        }
    }
}

impl fmt::Display for BulkDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// One item that failed, with the error classified for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub post_id: PostId,
    pub kind: FailureKind,
    pub error: String,
}

/// Per-item breakdown of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub success: Vec<PostId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

impl WorkflowEngine {
    /// Apply one decision across many posts.
    ///
    /// Items are processed independently; a failure on one never aborts the
    /// rest. The result always carries the full success/failed breakdown.
    pub async fn bulk_advance(
        &self,
        post_ids: &[PostId],
        actor_id: &ActorId,
        decision: BulkDecision,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for post_id in post_ids {
            match self
                .advance(post_id, actor_id, decision.into(), ReviewNote::default())
                .await
            {
                Ok(_) => outcome.success.push(post_id.clone()),
                Err(e) => {
                    warn!(post_id = %post_id, decision = %decision, "bulk item failed: {}", e);
                    outcome.failed.push(BulkFailure {
                        post_id: post_id.clone(),
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            decision = %decision,
            total = post_ids.len(),
            succeeded = outcome.success.len(),
            failed = outcome.failed.len(),
            "bulk operation finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use greenlight_core::{
        ApproverRef, ContentStore, InMemoryContentStore, InMemoryDirectory,
        NotificationDispatcher, Post, PostStatus, TracingDispatcher,
    };

    use crate::workflow::definition::{Step, Workflow, WorkflowScope};
    use crate::workflow::repository::InMemoryRepository;
    use crate::workflow::state::AssignmentStatus;

    async fn engine_with_posts(posts: &[&str]) -> WorkflowEngine {
        let content = Arc::new(InMemoryContentStore::new());
        for id in posts {
            content
                .insert(Post {
                    id: PostId::from(*id),
                    author_id: ActorId::from("author"),
                    team_id: None,
                    content: "draft".to_string(),
                    media_urls: vec![],
                    scheduled_at: None,
                    status: PostStatus::Draft,
                })
                .await;
        }
        let engine = WorkflowEngine::new(
            Arc::new(InMemoryRepository::new()),
            content as Arc<dyn ContentStore>,
            Arc::new(InMemoryDirectory::new()),
            Arc::new(TracingDispatcher) as Arc<dyn NotificationDispatcher>,
        );
        engine
            .create_workflow(Workflow::new(
                ActorId::from("owner"),
                "single step",
                WorkflowScope::Global,
                vec![Step::new(1, "editorial", ApproverRef::Role("editor".into()))],
                Utc::now(),
            ))
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn failures_are_isolated_per_item() {
        let engine = engine_with_posts(&["p1", "p2", "p3"]).await;
        // p2 is never submitted, so it has no assignment.
        for id in ["p1", "p3"] {
            engine
                .ensure_assignment(&PostId::from(id), &ActorId::from("author"), None)
                .await
                .unwrap();
        }

        let outcome = engine
            .bulk_advance(
                &[PostId::from("p1"), PostId::from("p2"), PostId::from("p3")],
                &ActorId::from("ed1"),
                BulkDecision::Approve,
            )
            .await;

        assert_eq!(outcome.success, vec![PostId::from("p1"), PostId::from("p3")]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].post_id, PostId::from("p2"));
        assert_eq!(outcome.failed[0].kind, FailureKind::NotFound);
        assert!(!outcome.all_succeeded());

        // p1 and p3 fully advanced despite p2's failure.
        for id in ["p1", "p3"] {
            assert!(engine
                .repo
                .active_assignment(&PostId::from(id))
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn bulk_reject_terminates_every_item() {
        let engine = engine_with_posts(&["p1", "p2"]).await;
        for id in ["p1", "p2"] {
            engine
                .ensure_assignment(&PostId::from(id), &ActorId::from("author"), None)
                .await
                .unwrap();
        }

        let outcome = engine
            .bulk_advance(
                &[PostId::from("p1"), PostId::from("p2")],
                &ActorId::from("ed1"),
                BulkDecision::Reject,
            )
            .await;

        assert!(outcome.all_succeeded());
        for id in ["p1", "p2"] {
            let post = engine.content.get_post(&PostId::from(id)).await.unwrap();
            assert_eq!(post.status, PostStatus::Rejected);
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let engine = engine_with_posts(&[]).await;
        let outcome = engine
            .bulk_advance(&[], &ActorId::from("ed1"), BulkDecision::Approve)
            .await;
        assert!(outcome.success.is_empty());
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn single_step_approve_completes_the_assignment() {
        let engine = engine_with_posts(&["p1"]).await;
        engine
            .ensure_assignment(&PostId::from("p1"), &ActorId::from("author"), None)
            .await
            .unwrap();

        let outcome = engine
            .bulk_advance(
                &[PostId::from("p1")],
                &ActorId::from("ed1"),
                BulkDecision::Approve,
            )
            .await;
        assert!(outcome.all_succeeded());

        // Completed means terminal, so ensure creates a new cycle next time.
        let fresh = engine
            .ensure_assignment(&PostId::from("p1"), &ActorId::from("author"), None)
            .await
            .unwrap();
        assert_eq!(fresh.status, AssignmentStatus::Pending);
    }
}
