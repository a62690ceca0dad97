//! Typed reads over the temporal store.

use beerflow_store::{PartitionRegistry, Record, RecordPattern, StoreError, TemporalStore};
use beerflow_types::{
    Actor, ActorMetrics, CostTotal, InventorySnapshot, Order, RecordKind, Shipment,
};

/// Typed accessors for one actor's partition and the federated view.
pub struct StoreReader<'a, S> {
    store: &'a S,
    registry: &'a PartitionRegistry,
}

impl<'a, S: TemporalStore> StoreReader<'a, S> {
    /// Read from `store` using `registry` to locate partitions.
    pub const fn new(store: &'a S, registry: &'a PartitionRegistry) -> Self {
        Self { store, registry }
    }

    async fn local(&self, actor: Actor, pattern: RecordPattern) -> Result<Vec<Record>, StoreError> {
        self.store
            .query(self.registry.partition(actor), &pattern)
            .await
    }

    /// The actor's inventory snapshot for `week`.
    pub async fn inventory(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<Option<InventorySnapshot>, StoreError> {
        let records = self
            .local(actor, RecordPattern::of(RecordKind::Inventory).in_week(week))
            .await?;
        Ok(records.iter().find_map(Record::as_inventory).copied())
    }

    /// Every inventory snapshot of the actor, oldest first.
    pub async fn inventory_history(
        &self,
        actor: Actor,
    ) -> Result<Vec<InventorySnapshot>, StoreError> {
        let records = self
            .local(actor, RecordPattern::of(RecordKind::Inventory))
            .await?;
        let mut snapshots: Vec<InventorySnapshot> =
            records.iter().filter_map(Record::as_inventory).copied().collect();
        snapshots.sort_by_key(|s| s.week);
        Ok(snapshots)
    }

    /// The actor's metrics for `week`.
    pub async fn metrics(&self, actor: Actor, week: u32) -> Result<Option<ActorMetrics>, StoreError> {
        let records = self
            .local(actor, RecordPattern::of(RecordKind::Metrics).in_week(week))
            .await?;
        Ok(records.iter().find_map(Record::as_metrics).copied())
    }

    /// The order the actor placed in `week`.
    pub async fn order(&self, actor: Actor, week: u32) -> Result<Option<Order>, StoreError> {
        let records = self
            .local(actor, RecordPattern::of(RecordKind::Order).in_week(week))
            .await?;
        Ok(records.iter().find_map(Record::as_order).copied())
    }

    /// Customer demand the retailer faces in `week`.
    pub async fn customer_demand(&self, week: u32) -> Result<Option<u32>, StoreError> {
        let records = self
            .local(
                Actor::Retailer,
                RecordPattern::of(RecordKind::CustomerDemand).in_week(week),
            )
            .await?;
        Ok(records
            .iter()
            .find_map(Record::as_customer_demand)
            .map(|d| d.quantity))
    }

    /// The actor's running cost total.
    pub async fn cost_total(&self, actor: Actor) -> Result<Option<CostTotal>, StoreError> {
        let records = self
            .local(actor, RecordPattern::of(RecordKind::CostTotal))
            .await?;
        Ok(records.iter().find_map(Record::as_cost_total).copied())
    }

    /// Shipments the actor dispatched in `week`.
    pub async fn shipments_from(&self, actor: Actor, week: u32) -> Result<Vec<Shipment>, StoreError> {
        let records = self
            .local(actor, RecordPattern::of(RecordKind::Shipment).in_week(week))
            .await?;
        Ok(records.iter().filter_map(Record::as_shipment).copied().collect())
    }

    /// Highest week anchored in any partition.
    pub async fn latest_week(&self) -> Result<Option<u32>, StoreError> {
        let records = self
            .store
            .federated_query(&RecordPattern::of(RecordKind::Week))
            .await?;
        Ok(records.iter().filter_map(Record::week).max())
    }

    // =========================================================================
    // Federated reads
    // =========================================================================

    /// Orders from any partition placed in `week` and addressed to `actor`.
    pub async fn orders_addressed_to(&self, actor: Actor, week: u32) -> Result<Vec<Order>, StoreError> {
        let records = self
            .store
            .federated_query(
                &RecordPattern::of(RecordKind::Order)
                    .in_week(week)
                    .addressed_to(actor),
            )
            .await?;
        Ok(records.iter().filter_map(Record::as_order).copied().collect())
    }

    /// Shipments from any partition arriving at `actor` in `week`.
    pub async fn arrivals(&self, actor: Actor, week: u32) -> Result<Vec<Shipment>, StoreError> {
        let records = self
            .store
            .federated_query(
                &RecordPattern::of(RecordKind::Shipment)
                    .addressed_to(actor)
                    .arriving_in(week),
            )
            .await?;
        Ok(records.iter().filter_map(Record::as_shipment).copied().collect())
    }

    /// Shipments from any partition still travelling to `actor` after
    /// `week`.
    pub async fn in_transit(&self, actor: Actor, week: u32) -> Result<Vec<Shipment>, StoreError> {
        let records = self
            .store
            .federated_query(
                &RecordPattern::of(RecordKind::Shipment)
                    .addressed_to(actor)
                    .in_transit_after(week),
            )
            .await?;
        Ok(records.iter().filter_map(Record::as_shipment).copied().collect())
    }
}
