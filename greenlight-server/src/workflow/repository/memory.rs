//! In-memory implementation of [`Repository`].
//!
//! All state lives in RwLock'd maps and is lost on drop. This is the backend
//! the test suite runs against and a reasonable choice for embedded use.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use greenlight_core::{ActorId, AssignmentId, CommentId, PostId, RevisionId, WorkflowId};

use super::{Repository, RepositoryError};
use crate::comments::Comment;
use crate::history::{ActionCounts, HistoryEntry, HistoryQuery};
use crate::revisions::Revision;
use crate::workflow::definition::Workflow;
use crate::workflow::state::Assignment;

/// In-memory repository.
#[derive(Default)]
pub struct InMemoryRepository {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
    assignments: RwLock<HashMap<AssignmentId, Assignment>>,
    history: RwLock<Vec<HistoryEntry>>,
    comments: RwLock<Vec<Comment>>,
    revisions: RwLock<Vec<Revision>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    async fn workflow(&self, id: &WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(id).cloned())
    }

    async fn active_workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.values().filter(|w| w.is_active).cloned().collect())
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> Result<(), RepositoryError> {
        let mut assignments = self.assignments.write().await;
        let duplicate = assignments
            .values()
            .any(|a| a.post_id == assignment.post_id && !a.is_terminal());
        if duplicate {
            return Err(RepositoryError::DuplicateAssignment(
                assignment.post_id.clone(),
            ));
        }
        assignments.insert(assignment.id.clone(), assignment.clone());
        Ok(())
    }

    async fn active_assignment(
        &self,
        post_id: &PostId,
    ) -> Result<Option<Assignment>, RepositoryError> {
        let assignments = self.assignments.read().await;
        Ok(assignments
            .values()
            .find(|a| &a.post_id == post_id && !a.is_terminal())
            .cloned())
    }

    async fn update_assignment(
        &self,
        assignment: &Assignment,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut assignments = self.assignments.write().await;
        match assignments.get(&assignment.id) {
            Some(stored) if stored.version == expected_version => {
                assignments.insert(assignment.id.clone(), assignment.clone());
                Ok(())
            }
            _ => Err(RepositoryError::Conflict(assignment.id.clone())),
        }
    }

    async fn pending_assignments(&self) -> Result<Vec<Assignment>, RepositoryError> {
        let assignments = self.assignments.read().await;
        let mut pending: Vec<Assignment> = assignments
            .values()
            .filter(|a| !a.is_terminal())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), RepositoryError> {
        let mut history = self.history.write().await;
        history.push(entry.clone());
        Ok(())
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let history = self.history.read().await;
        let mut matched: Vec<HistoryEntry> = history
            .iter()
            .filter(|e| {
                query.post_id.as_ref().is_none_or(|p| &e.post_id == p)
                    && query.actor_id.as_ref().is_none_or(|a| &e.actor_id == a)
                    && query.before.is_none_or(|cutoff| e.created_at < cutoff)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(query.effective_limit());
        Ok(matched)
    }

    async fn action_counts(&self, actor_id: &ActorId) -> Result<ActionCounts, RepositoryError> {
        let history = self.history.read().await;
        let mut counts = ActionCounts::default();
        for entry in history.iter().filter(|e| &e.actor_id == actor_id) {
            counts.record(entry.action);
        }
        Ok(counts)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), RepositoryError> {
        let mut comments = self.comments.write().await;
        comments.push(comment.clone());
        Ok(())
    }

    async fn comment(&self, id: &CommentId) -> Result<Option<Comment>, RepositoryError> {
        let comments = self.comments.read().await;
        Ok(comments.iter().find(|c| &c.id == id).cloned())
    }

    async fn resolve_comment(
        &self,
        id: &CommentId,
        resolved_by: &ActorId,
        resolved_at: DateTime<Utc>,
        resolution: Option<&str>,
    ) -> Result<Option<Comment>, RepositoryError> {
        let mut comments = self.comments.write().await;
        match comments.iter_mut().find(|c| &c.id == id) {
            Some(comment) => {
                comment.is_resolved = true;
                comment.resolved_by = Some(resolved_by.clone());
                comment.resolved_at = Some(resolved_at);
                comment.resolution = resolution.map(|s| s.to_string());
                Ok(Some(comment.clone()))
            }
            None => Ok(None),
        }
    }

    async fn comments_for_post(&self, post_id: &PostId) -> Result<Vec<Comment>, RepositoryError> {
        let comments = self.comments.read().await;
        let mut matched: Vec<Comment> = comments
            .iter()
            .filter(|c| &c.post_id == post_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched)
    }

    async fn insert_revision(&self, revision: &Revision) -> Result<(), RepositoryError> {
        let mut revisions = self.revisions.write().await;
        revisions.push(revision.clone());
        Ok(())
    }

    async fn revision(&self, id: &RevisionId) -> Result<Option<Revision>, RepositoryError> {
        let revisions = self.revisions.read().await;
        Ok(revisions.iter().find(|r| &r.id == id).cloned())
    }

    async fn revisions_for_post(
        &self,
        post_id: &PostId,
    ) -> Result<Vec<Revision>, RepositoryError> {
        let revisions = self.revisions.read().await;
        let mut matched: Vec<Revision> = revisions
            .iter()
            .filter(|r| &r.post_id == post_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched)
    }
}
