//! Error types for the store layer.
//!
//! All failures surface as [`StoreError`]. The rule pipeline retries a
//! failed rule application only when [`StoreError::is_transient`] says the
//! failure may clear on its own.

use crate::partition::Partition;

/// Errors that can occur while reading or writing the temporal store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Backend-specific description of the outage.
        reason: String,
    },

    /// A store call exceeded its deadline.
    #[error("store call timed out after {millis} ms")]
    Timeout {
        /// The deadline that was exceeded.
        millis: u64,
    },

    /// The addressed partition is not registered.
    #[error("unknown partition: {partition}")]
    UnknownPartition {
        /// The partition that was addressed.
        partition: Partition,
    },

    /// A record the caller relies on does not exist.
    #[error("missing record: {what}")]
    MissingRecord {
        /// Description of the missing record.
        what: String,
    },

    /// A record was written to a partition that does not own it.
    #[error("record for {owner} cannot be written to partition {partition}")]
    ForeignWrite {
        /// Partition the write targeted.
        partition: Partition,
        /// Owner recorded on the rejected record.
        owner: String,
    },
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outages_are_transient() {
        assert!(
            StoreError::Unavailable {
                reason: "connection reset".to_owned()
            }
            .is_transient()
        );
        assert!(StoreError::Timeout { millis: 30_000 }.is_transient());
    }

    #[test]
    fn addressing_errors_are_permanent() {
        let err = StoreError::UnknownPartition {
            partition: Partition::new("bg_nowhere"),
        };
        assert!(!err.is_transient());
        assert!(
            !StoreError::MissingRecord {
                what: "inventory".to_owned()
            }
            .is_transient()
        );
    }
}
