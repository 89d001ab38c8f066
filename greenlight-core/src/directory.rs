//! Approver directory collaborator.
//!
//! Workflow steps name their approvers as a single user, a role, or a team.
//! Identity itself is external (actors arrive already authenticated), so
//! expanding a role or team into concrete actor ids is a lookup against the
//! platform's directory, abstracted here.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::ids::{ActorId, TeamId};

/// Who may approve a workflow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "ref", rename_all = "snake_case")]
pub enum ApproverRef {
    /// A single named user.
    User(ActorId),
    /// Every member of a role.
    Role(String),
    /// Every member of a team.
    Team(TeamId),
}

impl fmt::Display for ApproverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id),
            Self::Role(role) => write!(f, "role:{}", role),
            Self::Team(id) => write!(f, "team:{}", id),
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Resolves approver references to concrete actors.
#[async_trait]
pub trait ApproverDirectory: Send + Sync {
    /// All actors covered by the reference. A user reference always resolves
    /// to exactly that user, whether or not the directory knows them.
    async fn members(&self, approver: &ApproverRef) -> Result<Vec<ActorId>, DirectoryError>;

    /// Whether `actor` is covered by the reference.
    async fn is_member(
        &self,
        actor: &ActorId,
        approver: &ApproverRef,
    ) -> Result<bool, DirectoryError> {
        Ok(self.members(approver).await?.contains(actor))
    }
}

/// Per-actor directory record.
#[derive(Debug, Clone, Default)]
struct Membership {
    roles: Vec<String>,
    teams: Vec<TeamId>,
}

/// In-memory directory for tests and embedded use.
#[derive(Default)]
pub struct InMemoryDirectory {
    memberships: RwLock<HashMap<ActorId, Membership>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor with the given roles and team memberships.
    pub async fn add_actor(&self, actor: ActorId, roles: &[&str], teams: &[TeamId]) {
        let mut memberships = self.memberships.write().await;
        memberships.insert(
            actor,
            Membership {
                roles: roles.iter().map(|r| r.to_string()).collect(),
                teams: teams.to_vec(),
            },
        );
    }
}

#[async_trait]
impl ApproverDirectory for InMemoryDirectory {
    async fn members(&self, approver: &ApproverRef) -> Result<Vec<ActorId>, DirectoryError> {
        let memberships = self.memberships.read().await;
        let mut actors: Vec<ActorId> = match approver {
            ApproverRef::User(id) => return Ok(vec![id.clone()]),
            ApproverRef::Role(role) => memberships
                .iter()
                .filter(|(_, m)| m.roles.iter().any(|r| r == role))
                .map(|(id, _)| id.clone())
                .collect(),
            ApproverRef::Team(team) => memberships
                .iter()
                .filter(|(_, m)| m.teams.contains(team))
                .map(|(id, _)| id.clone())
                .collect(),
        };
        actors.sort();
        Ok(actors)
    }
}
