//! Partition identifiers and the actor-to-partition registry.
//!
//! Each actor owns exactly one partition. The registry is built once at
//! startup from a name prefix and never changes afterwards.

use core::fmt;

use beerflow_types::{Actor, PerActor};
use serde::{Deserialize, Serialize};

/// Name of one actor's private data partition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Partition(String);

impl Partition {
    /// Wrap a partition name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The partition name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed mapping from every [`Actor`] to its [`Partition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRegistry {
    partitions: PerActor<Partition>,
}

impl PartitionRegistry {
    /// Build the registry, naming each partition `<prefix>_<actor>`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            partitions: PerActor::from_fn(|actor| {
                Partition::new(format!("{prefix}_{}", actor.as_str()))
            }),
        }
    }

    /// The partition owned by `actor`.
    pub const fn partition(&self, actor: Actor) -> &Partition {
        self.partitions.get(actor)
    }

    /// The actor owning `partition`, if it is registered.
    pub fn owner(&self, partition: &Partition) -> Option<Actor> {
        self.partitions
            .iter()
            .find_map(|(actor, p)| (p == partition).then_some(actor))
    }

    /// All registered partitions in actor order.
    pub fn partitions(&self) -> impl Iterator<Item = (Actor, &Partition)> {
        self.partitions.iter()
    }
}

impl Default for PartitionRegistry {
    fn default() -> Self {
        Self::with_prefix("bg")
    }
}
