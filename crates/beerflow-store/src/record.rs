//! Store records, their natural keys, and query patterns.

use beerflow_types::{
    Actor, ActorMetrics, CostTotal, CustomerDemand, InventorySnapshot, Order, RecordKind, Shipment,
    Week,
};
use serde::{Deserialize, Serialize};

/// Any entity the store can hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// Week anchor.
    Week(Week),
    /// Inventory snapshot.
    Inventory(InventorySnapshot),
    /// Customer demand (retailer partition only).
    CustomerDemand(CustomerDemand),
    /// Replenishment or production order.
    Order(Order),
    /// Dispatched goods.
    Shipment(Shipment),
    /// Derived metrics.
    Metrics(ActorMetrics),
    /// Running cost total.
    CostTotal(CostTotal),
}

impl Record {
    /// The record's kind.
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Week(_) => RecordKind::Week,
            Self::Inventory(_) => RecordKind::Inventory,
            Self::CustomerDemand(_) => RecordKind::CustomerDemand,
            Self::Order(_) => RecordKind::Order,
            Self::Shipment(_) => RecordKind::Shipment,
            Self::Metrics(_) => RecordKind::Metrics,
            Self::CostTotal(_) => RecordKind::CostTotal,
        }
    }

    /// The week the record belongs to; `None` for cost totals.
    pub const fn week(&self) -> Option<u32> {
        match self {
            Self::Week(w) => Some(w.number),
            Self::Inventory(s) => Some(s.week),
            Self::CustomerDemand(d) => Some(d.week),
            Self::Order(o) => Some(o.week),
            Self::Shipment(s) => Some(s.week),
            Self::Metrics(m) => Some(m.week),
            Self::CostTotal(_) => None,
        }
    }

    /// The actor whose partition must hold this record.
    ///
    /// Week anchors belong to every partition and report `None`.
    pub const fn owner(&self) -> Option<Actor> {
        match self {
            Self::Week(_) => None,
            Self::Inventory(s) => Some(s.actor),
            Self::CustomerDemand(_) => Some(Actor::Retailer),
            Self::Order(o) => Some(o.placed_by),
            Self::Shipment(s) => Some(s.shipped_from),
            Self::Metrics(m) => Some(m.actor),
            Self::CostTotal(c) => Some(c.actor),
        }
    }

    /// The other actor an order or shipment is addressed to.
    pub const fn counterpart(&self) -> Option<Actor> {
        match self {
            Self::Order(o) => Some(o.received_by),
            Self::Shipment(s) => Some(s.shipped_to),
            _ => None,
        }
    }

    /// Arrival week of a shipment.
    pub const fn arrival_week(&self) -> Option<u32> {
        match self {
            Self::Shipment(s) => Some(s.arrival_week),
            _ => None,
        }
    }

    /// The key under which the record is stored in its partition.
    pub const fn key(&self) -> RecordKey {
        let counterpart = match self {
            Self::Shipment(s) => Some(s.shipped_to),
            _ => None,
        };
        RecordKey {
            kind: self.kind(),
            week: self.week(),
            counterpart,
        }
    }

    /// The inventory snapshot, if this is one.
    pub const fn as_inventory(&self) -> Option<&InventorySnapshot> {
        match self {
            Self::Inventory(s) => Some(s),
            _ => None,
        }
    }

    /// The customer demand, if this is one.
    pub const fn as_customer_demand(&self) -> Option<&CustomerDemand> {
        match self {
            Self::CustomerDemand(d) => Some(d),
            _ => None,
        }
    }

    /// The order, if this is one.
    pub const fn as_order(&self) -> Option<&Order> {
        match self {
            Self::Order(o) => Some(o),
            _ => None,
        }
    }

    /// The shipment, if this is one.
    pub const fn as_shipment(&self) -> Option<&Shipment> {
        match self {
            Self::Shipment(s) => Some(s),
            _ => None,
        }
    }

    /// The metrics, if this is one.
    pub const fn as_metrics(&self) -> Option<&ActorMetrics> {
        match self {
            Self::Metrics(m) => Some(m),
            _ => None,
        }
    }

    /// The cost total, if this is one.
    pub const fn as_cost_total(&self) -> Option<&CostTotal> {
        match self {
            Self::CostTotal(c) => Some(c),
            _ => None,
        }
    }
}

/// Natural key of a record within one partition.
///
/// Orders are unique per week (one per placing actor, and each partition
/// has one placing actor); shipments are unique per week and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Record kind.
    pub kind: RecordKind,
    /// Week, absent for cost totals.
    pub week: Option<u32>,
    /// Destination actor, for shipments.
    pub counterpart: Option<Actor>,
}

impl RecordKey {
    const fn weekly(kind: RecordKind, week: u32) -> Self {
        Self {
            kind,
            week: Some(week),
            counterpart: None,
        }
    }

    /// Key of the week anchor.
    pub const fn week(week: u32) -> Self {
        Self::weekly(RecordKind::Week, week)
    }

    /// Key of an inventory snapshot.
    pub const fn inventory(week: u32) -> Self {
        Self::weekly(RecordKind::Inventory, week)
    }

    /// Key of a customer demand record.
    pub const fn customer_demand(week: u32) -> Self {
        Self::weekly(RecordKind::CustomerDemand, week)
    }

    /// Key of the order placed in `week`.
    pub const fn order(week: u32) -> Self {
        Self::weekly(RecordKind::Order, week)
    }

    /// Key of the shipment dispatched in `week` towards `to`.
    pub const fn shipment(week: u32, to: Actor) -> Self {
        Self {
            kind: RecordKind::Shipment,
            week: Some(week),
            counterpart: Some(to),
        }
    }

    /// Key of the metrics record.
    pub const fn metrics(week: u32) -> Self {
        Self::weekly(RecordKind::Metrics, week)
    }

    /// Key of the running cost total.
    pub const fn cost_total() -> Self {
        Self {
            kind: RecordKind::CostTotal,
            week: None,
            counterpart: None,
        }
    }
}

/// Filter applied by store queries. Unset fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordPattern {
    /// Required record kind.
    pub kind: Option<RecordKind>,
    /// Required week.
    pub week: Option<u32>,
    /// Required counterpart (order supplier or shipment destination).
    pub counterpart: Option<Actor>,
    /// Required shipment arrival week.
    pub arrival_week: Option<u32>,
    /// Shipments arriving strictly after this week.
    pub arriving_after: Option<u32>,
}

impl RecordPattern {
    /// Match every record of `kind`.
    pub const fn of(kind: RecordKind) -> Self {
        Self {
            kind: Some(kind),
            week: None,
            counterpart: None,
            arrival_week: None,
            arriving_after: None,
        }
    }

    /// Restrict to one week.
    #[must_use]
    pub const fn in_week(mut self, week: u32) -> Self {
        self.week = Some(week);
        self
    }

    /// Restrict to orders or shipments addressed to `actor`.
    #[must_use]
    pub const fn addressed_to(mut self, actor: Actor) -> Self {
        self.counterpart = Some(actor);
        self
    }

    /// Restrict to shipments arriving in `week`.
    #[must_use]
    pub const fn arriving_in(mut self, week: u32) -> Self {
        self.arrival_week = Some(week);
        self
    }

    /// Restrict to shipments still in transit after `week`.
    #[must_use]
    pub const fn in_transit_after(mut self, week: u32) -> Self {
        self.arriving_after = Some(week);
        self
    }

    /// Whether `record` satisfies every set field.
    pub fn matches(&self, record: &Record) -> bool {
        fn check<T: PartialEq>(want: Option<T>, have: Option<T>) -> bool {
            want.is_none_or(|w| have == Some(w))
        }

        check(self.kind, Some(record.kind()))
            && check(self.week, record.week())
            && check(self.counterpart, record.counterpart())
            && check(self.arrival_week, record.arrival_week())
            && self
                .arriving_after
                .is_none_or(|after| record.arrival_week().is_some_and(|a| a > after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipment(week: u32, to: Actor, arrival_week: u32) -> Record {
        Record::Shipment(Shipment {
            week,
            shipped_from: Actor::Wholesaler,
            shipped_to: to,
            quantity: 4,
            arrival_week,
        })
    }

    #[test]
    fn shipment_key_includes_destination() {
        let a = shipment(1, Actor::Retailer, 3).key();
        let b = shipment(1, Actor::Wholesaler, 3).key();
        assert_ne!(a, b);
        assert_eq!(a, RecordKey::shipment(1, Actor::Retailer));
    }

    #[test]
    fn order_key_ignores_supplier() {
        let order = Record::Order(Order {
            week: 2,
            placed_by: Actor::Factory,
            received_by: Actor::Factory,
            quantity: 4,
            amplification: None,
        });
        assert_eq!(order.key(), RecordKey::order(2));
        assert_eq!(order.owner(), Some(Actor::Factory));
    }

    #[test]
    fn pattern_filters_on_arrival() {
        let pattern = RecordPattern::of(RecordKind::Shipment)
            .addressed_to(Actor::Retailer)
            .arriving_in(3);
        assert!(pattern.matches(&shipment(1, Actor::Retailer, 3)));
        assert!(!pattern.matches(&shipment(1, Actor::Retailer, 4)));
        assert!(!pattern.matches(&shipment(1, Actor::Distributor, 3)));
    }

    #[test]
    fn in_transit_excludes_arrived_goods() {
        let pattern = RecordPattern::of(RecordKind::Shipment).in_transit_after(3);
        assert!(pattern.matches(&shipment(2, Actor::Retailer, 4)));
        assert!(!pattern.matches(&shipment(1, Actor::Retailer, 3)));
        let week = Record::Week(Week::new(3));
        assert!(!RecordPattern::default().in_transit_after(1).matches(&week));
    }

    #[test]
    fn empty_pattern_matches_everything() {
        assert!(RecordPattern::default().matches(&Record::Week(Week::new(1))));
    }
}
