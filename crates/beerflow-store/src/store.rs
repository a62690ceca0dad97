//! The temporal store collaborator interface.
//!
//! Each actor's records live in a private [`Partition`]. Reads are either
//! restricted to one partition ([`TemporalStore::query`]) or span all of
//! them ([`TemporalStore::federated_query`]). Every write goes through
//! [`TemporalStore::update`] with a [`Mutation`].

use core::future::Future;

use crate::error::StoreError;
use crate::mutation::{Mutation, UpdateOutcome};
use crate::partition::Partition;
use crate::record::{Record, RecordPattern};

/// Partitioned, versioned record store.
///
/// Implementations serialize writes per partition; callers never write
/// two mutations to the same partition concurrently.
pub trait TemporalStore: Send + Sync {
    /// Records in `partition` matching `pattern`.
    fn query(
        &self,
        partition: &Partition,
        pattern: &RecordPattern,
    ) -> impl Future<Output = Result<Vec<Record>, StoreError>> + Send;

    /// Records in every partition matching `pattern` (read-only view).
    fn federated_query(
        &self,
        pattern: &RecordPattern,
    ) -> impl Future<Output = Result<Vec<Record>, StoreError>> + Send;

    /// Apply `mutation` to `partition` atomically.
    fn update(
        &self,
        partition: &Partition,
        mutation: Mutation,
    ) -> impl Future<Output = Result<UpdateOutcome, StoreError>> + Send;
}
