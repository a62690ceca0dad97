//! Partitioned temporal record store for the Beerflow simulation.
//!
//! # Modules
//!
//! - [`error`] -- Store error type with transient/permanent classification
//! - [`partition`] -- Partition names and the actor-to-partition registry
//! - [`record`] -- Records, natural keys, and query patterns
//! - [`mutation`] -- Conditional delete-then-insert mutations
//! - [`store`] -- The [`TemporalStore`] collaborator trait
//! - [`memory`] -- In-memory reference store

pub mod error;
pub mod memory;
pub mod mutation;
pub mod partition;
pub mod record;
pub mod store;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use mutation::{Condition, Mutation, UpdateOutcome};
pub use partition::{Partition, PartitionRegistry};
pub use record::{Record, RecordKey, RecordPattern};
pub use store::TemporalStore;
