//! In-memory reference implementation of [`TemporalStore`].
//!
//! Holds one ordered map per registered partition behind a single
//! [`RwLock`]. Every applied mutation bumps the partition's revision, which
//! makes "nothing changed" observable in tests.

use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::trace;

use crate::error::StoreError;
use crate::mutation::{Mutation, UpdateOutcome};
use crate::partition::{Partition, PartitionRegistry};
use crate::record::{Record, RecordKey, RecordPattern};
use crate::store::TemporalStore;

#[derive(Debug, Default)]
struct PartitionState {
    records: BTreeMap<RecordKey, Record>,
    revision: u64,
}

/// A [`TemporalStore`] held entirely in process memory.
#[derive(Debug)]
pub struct InMemoryStore {
    registry: PartitionRegistry,
    partitions: RwLock<BTreeMap<Partition, PartitionState>>,
}

impl InMemoryStore {
    /// Create an empty store with one partition per registered actor.
    pub fn new(registry: PartitionRegistry) -> Self {
        let partitions = registry
            .partitions()
            .map(|(_, p)| (p.clone(), PartitionState::default()))
            .collect();
        Self {
            registry,
            partitions: RwLock::new(partitions),
        }
    }

    /// Number of mutations applied to `partition` so far.
    pub async fn revision(&self, partition: &Partition) -> Result<u64, StoreError> {
        let guard = self.partitions.read().await;
        guard
            .get(partition)
            .map(|state| state.revision)
            .ok_or_else(|| StoreError::UnknownPartition {
                partition: partition.clone(),
            })
    }

    /// Total number of records across all partitions.
    pub async fn record_count(&self) -> usize {
        let guard = self.partitions.read().await;
        guard.values().map(|state| state.records.len()).sum()
    }

    fn check_ownership(&self, partition: &Partition, mutation: &Mutation) -> Result<(), StoreError> {
        let owner = self.registry.owner(partition);
        for record in &mutation.insert {
            match record.owner() {
                Some(record_owner) if owner != Some(record_owner) => {
                    return Err(StoreError::ForeignWrite {
                        partition: partition.clone(),
                        owner: record_owner.to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl TemporalStore for InMemoryStore {
    async fn query(
        &self,
        partition: &Partition,
        pattern: &RecordPattern,
    ) -> Result<Vec<Record>, StoreError> {
        let guard = self.partitions.read().await;
        let state = guard
            .get(partition)
            .ok_or_else(|| StoreError::UnknownPartition {
                partition: partition.clone(),
            })?;
        Ok(state
            .records
            .values()
            .filter(|r| pattern.matches(r))
            .copied()
            .collect())
    }

    async fn federated_query(&self, pattern: &RecordPattern) -> Result<Vec<Record>, StoreError> {
        let guard = self.partitions.read().await;
        Ok(guard
            .values()
            .flat_map(|state| state.records.values())
            .filter(|r| pattern.matches(r))
            .copied()
            .collect())
    }

    async fn update(
        &self,
        partition: &Partition,
        mutation: Mutation,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check_ownership(partition, &mutation)?;

        let mut guard = self.partitions.write().await;
        let state = guard
            .get_mut(partition)
            .ok_or_else(|| StoreError::UnknownPartition {
                partition: partition.clone(),
            })?;

        if !mutation.condition.holds(|key| state.records.get(key)) {
            trace!(partition = %partition, "update condition failed");
            return Ok(UpdateOutcome::ConditionFailed);
        }

        for key in &mutation.delete {
            state.records.remove(key);
        }
        for record in mutation.insert {
            state.records.insert(record.key(), record);
        }
        state.revision = state.revision.saturating_add(1);
        trace!(partition = %partition, revision = state.revision, "update applied");
        Ok(UpdateOutcome::Applied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use beerflow_types::{Actor, InventorySnapshot, Order, RecordKind, Shipment};

    use super::*;

    fn store() -> (InMemoryStore, PartitionRegistry) {
        let registry = PartitionRegistry::with_prefix("test");
        (InMemoryStore::new(registry.clone()), registry)
    }

    fn order(placed_by: Actor, received_by: Actor, week: u32) -> Record {
        Record::Order(Order {
            week,
            placed_by,
            received_by,
            quantity: 4,
            amplification: None,
        })
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let (store, registry) = store();
        let partition = registry.partition(Actor::Retailer);
        let record = order(Actor::Retailer, Actor::Wholesaler, 1);

        let first = store.update(partition, Mutation::create(record)).await.unwrap();
        let second = store.update(partition, Mutation::create(record)).await.unwrap();

        assert_eq!(first, UpdateOutcome::Applied);
        assert_eq!(second, UpdateOutcome::ConditionFailed);
        assert_eq!(store.revision(partition).await.unwrap(), 1);
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn query_is_partition_local() {
        let (store, registry) = store();
        for actor in [Actor::Retailer, Actor::Wholesaler] {
            let record = order(actor, actor.default_upstream().unwrap(), 1);
            store
                .update(registry.partition(actor), Mutation::create(record))
                .await
                .unwrap();
        }

        let local = store
            .query(
                registry.partition(Actor::Retailer),
                &RecordPattern::of(RecordKind::Order),
            )
            .await
            .unwrap();
        assert_eq!(local.len(), 1);

        let federated = store
            .federated_query(&RecordPattern::of(RecordKind::Order).addressed_to(Actor::Distributor))
            .await
            .unwrap();
        assert_eq!(federated.len(), 1);
        assert_eq!(federated.first().unwrap().owner(), Some(Actor::Wholesaler));
    }

    #[tokio::test]
    async fn foreign_write_is_rejected() {
        let (store, registry) = store();
        let shipment = Record::Shipment(Shipment {
            week: 1,
            shipped_from: Actor::Wholesaler,
            shipped_to: Actor::Retailer,
            quantity: 4,
            arrival_week: 3,
        });
        let err = store
            .update(registry.partition(Actor::Retailer), Mutation::create(shipment))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignWrite { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn replace_swaps_record_atomically() {
        let (store, registry) = store();
        let partition = registry.partition(Actor::Factory);
        let before = Record::Inventory(InventorySnapshot::opening(Actor::Factory, 1, 12, 0));
        let after = Record::Inventory(InventorySnapshot {
            stock: 8,
            processed: true,
            ..InventorySnapshot::opening(Actor::Factory, 1, 12, 0)
        });
        store.update(partition, Mutation::create(before)).await.unwrap();

        let applied = store
            .update(partition, Mutation::replace(before, after))
            .await
            .unwrap();
        let stale = store
            .update(partition, Mutation::replace(before, after))
            .await
            .unwrap();

        assert!(applied.is_applied());
        assert!(!stale.is_applied());
        let stored = store
            .query(partition, &RecordPattern::of(RecordKind::Inventory))
            .await
            .unwrap();
        assert_eq!(stored, vec![after]);
    }

    #[tokio::test]
    async fn unknown_partition_is_an_error() {
        let (store, _) = store();
        let err = store
            .query(&Partition::new("elsewhere"), &RecordPattern::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownPartition { .. }));
    }
}
