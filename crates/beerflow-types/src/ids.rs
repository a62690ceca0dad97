//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Week-scoped records are keyed by their natural key (kind, week, actor),
//! so only entities without one carry a generated identifier: simulation
//! runs and policy decisions. All IDs use UUID v7 (time-ordered) so audit
//! trails sort chronologically.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for one simulation run.
    SimulationId
}

define_id! {
    /// Unique identifier for a single decision-policy consultation.
    DecisionId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_values() {
        let a = DecisionId::new();
        let b = DecisionId::new();
        assert_ne!(a, b);
        assert_ne!(SimulationId::new().into_inner(), Uuid::nil());
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = DecisionId::new();
        let json = serde_json::to_string(&original).ok();
        assert!(json.is_some());
        let restored: Result<DecisionId, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(restored.ok(), Some(original));
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = SimulationId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
