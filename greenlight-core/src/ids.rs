//! Identifier newtypes.
//!
//! Every identifier is a distinct newtype over a string so that a post id
//! can never be passed where an actor id is expected. Identifiers the engine
//! assigns itself (assignments, comments, revisions, history entries) are
//! generated as UUID v4 before insert, so a row never needs a second write
//! to learn its own id.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

macro_rules! generated_id {
    ($(#[$meta:meta])* $name:ident) => {
        string_id!($(#[$meta])* $name);

        impl $name {
            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a post, assigned by the content platform.
    PostId
);
string_id!(
    /// Identifier of an authenticated actor. Supplied by the caller;
    /// the engine never defaults it.
    ActorId
);
string_id!(
    /// Identifier of a team in the content platform.
    TeamId
);

generated_id!(
    /// Identifier of a workflow definition.
    WorkflowId
);
generated_id!(
    /// Identifier of a single step within a workflow.
    StepId
);
generated_id!(
    /// Identifier of a workflow assignment (one live state machine per post).
    AssignmentId
);
generated_id!(
    /// Identifier of a review comment. Doubles as the thread id for roots.
    CommentId
);
generated_id!(
    /// Identifier of a content revision snapshot.
    RevisionId
);
generated_id!(
    /// Identifier of an audit history entry.
    HistoryId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = CommentId::generate();
        let b = CommentId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = PostId::from("post-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"post-1\"");
        let back: PostId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_inner() {
        let id = ActorId::from("alice");
        assert_eq!(id.to_string(), "alice");
        assert_eq!(id.as_str(), "alice");
    }
}
