use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Declares an opaque UUID-backed identifier newtype.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $name {
            type Err = crate::error::PlankoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| crate::error::PlankoError::InvalidId(s.to_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }
    };
}

entity_id!(
    /// Identifier of a board
    BoardId
);
entity_id!(
    /// Identifier of a column within a board
    ColumnId
);
entity_id!(
    /// Identifier of a task within a column
    TaskId
);
entity_id!(
    /// Identifier of a subtask checklist item
    SubtaskId
);
entity_id!(
    /// Identifier of an authenticated user, issued by the auth provider
    UserId
);
entity_id!(
    /// Identifier of a board membership row
    MemberId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn test_id_parsing() {
        let id = BoardId::new();
        let parsed = BoardId::from_str(&id.to_string()).unwrap();
        assert_eq!(parsed, id);

        let padded = format!("  {}\n", id);
        assert_eq!(BoardId::from_str(&padded).unwrap(), id);
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!(ColumnId::from_str("not-a-uuid").is_err());
        assert!(ColumnId::from_str("").is_err());
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = TaskId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
