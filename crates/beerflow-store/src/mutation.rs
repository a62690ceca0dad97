//! The single mutation primitive: an atomic conditional replace.
//!
//! A [`Mutation`] deletes a set of keys and inserts a set of records in one
//! step, provided its [`Condition`] still holds. Rules compute the new
//! state first and then submit one mutation, so a lost race surfaces as
//! [`UpdateOutcome::ConditionFailed`] rather than a half-applied write.

use crate::record::{Record, RecordKey};

/// Guard evaluated against the partition immediately before applying.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Apply only if no record exists under the key.
    Absent(RecordKey),
    /// Apply only if every listed record is still stored exactly as given.
    Unchanged(Vec<Record>),
}

impl Condition {
    /// Evaluate the condition given a lookup into the target partition.
    pub fn holds<'a>(&self, lookup: impl Fn(&RecordKey) -> Option<&'a Record>) -> bool {
        match self {
            Self::Absent(key) => lookup(key).is_none(),
            Self::Unchanged(expected) => expected
                .iter()
                .all(|record| lookup(&record.key()) == Some(record)),
        }
    }
}

/// Delete-then-insert, applied atomically under a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Keys removed before inserting.
    pub delete: Vec<RecordKey>,
    /// Records written after deleting.
    pub insert: Vec<Record>,
    /// Guard that must hold for anything to change.
    pub condition: Condition,
}

impl Mutation {
    /// Insert `record` only if nothing is stored under its key yet.
    pub fn create(record: Record) -> Self {
        Self {
            delete: Vec::new(),
            insert: vec![record],
            condition: Condition::Absent(record.key()),
        }
    }

    /// Replace `current` with `next` only if `current` is still stored.
    pub fn replace(current: Record, next: Record) -> Self {
        Self::replace_all(vec![current], vec![next])
    }

    /// Replace several records at once, only if none of `current` has
    /// changed.
    pub fn replace_all(current: Vec<Record>, next: Vec<Record>) -> Self {
        Self {
            delete: current.iter().map(Record::key).collect(),
            insert: next,
            condition: Condition::Unchanged(current),
        }
    }
}

/// Result of a store update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The mutation was applied.
    Applied,
    /// The condition did not hold; nothing changed.
    ConditionFailed,
}

impl UpdateOutcome {
    /// Whether the mutation changed the store.
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}
