//! Append-only audit history.
//!
//! Every engine action writes exactly one entry; entries are never updated
//! or deleted. The read path filters by actor and/or post, newest first,
//! paginated by a `created_at` cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use greenlight_core::{ActorId, HistoryId, PostId};

use crate::workflow::state::ReviewAction;

/// Default page size for history reads.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
/// Hard cap on a single history page.
pub const MAX_HISTORY_LIMIT: usize = 200;

/// What happened to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// The post entered its workflow.
    Submitted,
    Approved,
    Rejected,
    ChangesRequested,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::ChangesRequested => "changes_requested",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "changes_requested" => Some(Self::ChangesRequested),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ReviewAction> for HistoryAction {
    fn from(action: ReviewAction) -> Self {
        match action {
            ReviewAction::Approve => Self::Approved,
            ReviewAction::Reject => Self::Rejected,
            ReviewAction::RequestChanges => Self::ChangesRequested,
        }
    }
}

/// Optional free-text attached to an action.
///
/// Present only when the reviewer actually said something: `from_parts`
/// yields `None` when both the comment and the reason are absent or empty,
/// and otherwise keeps each part independently nullable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDetails {
    pub comment: Option<String>,
    pub reason: Option<String>,
}

impl ActionDetails {
    pub fn from_parts(comment: Option<String>, reason: Option<String>) -> Option<Self> {
        let comment = comment.filter(|s| !s.trim().is_empty());
        let reason = reason.filter(|s| !s.trim().is_empty());
        if comment.is_none() && reason.is_none() {
            None
        } else {
            Some(Self { comment, reason })
        }
    }
}

/// One row of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub post_id: PostId,
    pub actor_id: ActorId,
    pub action: HistoryAction,
    pub details: Option<ActionDetails>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        post_id: PostId,
        actor_id: ActorId,
        action: HistoryAction,
        details: Option<ActionDetails>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryId::generate(),
            post_id,
            actor_id,
            action,
            details,
            created_at,
        }
    }
}

/// Filter for history reads.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub post_id: Option<PostId>,
    pub actor_id: Option<ActorId>,
    /// Page size; `None` means [`DEFAULT_HISTORY_LIMIT`].
    pub limit: Option<usize>,
    /// Only entries strictly older than this cursor.
    pub before: Option<DateTime<Utc>>,
}

impl HistoryQuery {
    pub fn for_actor(actor_id: ActorId) -> Self {
        Self {
            actor_id: Some(actor_id),
            ..Self::default()
        }
    }

    pub fn for_post(post_id: PostId) -> Self {
        Self {
            post_id: Some(post_id),
            ..Self::default()
        }
    }

    /// Requested limit, defaulted and clamped.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

/// Per-action totals for one actor, used by the stats surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    pub submitted: u64,
    pub approved: u64,
    pub rejected: u64,
    pub changes_requested: u64,
}

impl ActionCounts {
    pub fn record(&mut self, action: HistoryAction) {
        match action {
            HistoryAction::Submitted => self.submitted += 1,
            HistoryAction::Approved => self.approved += 1,
            HistoryAction::Rejected => self.rejected += 1,
            HistoryAction::ChangesRequested => self.changes_requested += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_absent_when_both_parts_empty() {
        assert_eq!(ActionDetails::from_parts(None, None), None);
        assert_eq!(
            ActionDetails::from_parts(Some("".to_string()), Some("   ".to_string())),
            None
        );
    }

    #[test]
    fn details_keep_each_part_independently() {
        let details =
            ActionDetails::from_parts(None, Some("Content violates policy".to_string())).unwrap();
        assert_eq!(details.comment, None);
        assert_eq!(details.reason.as_deref(), Some("Content violates policy"));

        let details =
            ActionDetails::from_parts(Some("looks fine".to_string()), None).unwrap();
        assert_eq!(details.comment.as_deref(), Some("looks fine"));
        assert_eq!(details.reason, None);
    }

    #[test]
    fn effective_limit_defaults_and_clamps() {
        assert_eq!(HistoryQuery::default().effective_limit(), 50);
        let q = HistoryQuery {
            limit: Some(10_000),
            ..HistoryQuery::default()
        };
        assert_eq!(q.effective_limit(), MAX_HISTORY_LIMIT);
        let q = HistoryQuery {
            limit: Some(0),
            ..HistoryQuery::default()
        };
        assert_eq!(q.effective_limit(), 1);
    }

    #[test]
    fn action_round_trips_through_str() {
        for action in [
            HistoryAction::Submitted,
            HistoryAction::Approved,
            HistoryAction::Rejected,
            HistoryAction::ChangesRequested,
        ] {
            assert_eq!(HistoryAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(HistoryAction::parse("unknown"), None);
    }
}
