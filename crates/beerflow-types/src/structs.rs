//! Week-scoped records and static actor attributes.
//!
//! Every week-scoped record is keyed by its natural key (week plus the
//! owning actor, plus a counterpart actor for shipments). Counts are
//! non-negative integers; demand rates and coverage are floats; costs are
//! [`Decimal`] so accrual is exact.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::Actor;

// ---------------------------------------------------------------------------
// Week
// ---------------------------------------------------------------------------

/// Temporal anchor identifying one simulated week.
///
/// Created once by the orchestrator and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Week {
    /// The week number, starting at 1. Week 0 holds the initial pipeline.
    pub number: u32,
}

impl Week {
    /// Create an anchor for the given week number.
    pub const fn new(number: u32) -> Self {
        Self { number }
    }
}

// ---------------------------------------------------------------------------
// Actor profile
// ---------------------------------------------------------------------------

/// Static attributes of one actor, fixed for the life of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorProfile {
    /// Which actor these attributes describe.
    pub actor: Actor,
    /// Weeks between dispatching a shipment and its arrival.
    pub lead_time: u32,
    /// Weeks between placing an order and it being reviewed upstream.
    pub order_delay: u32,
    /// Cost per unit of stock held per week.
    pub holding_cost: Decimal,
    /// Cost per unit of unfilled demand per week.
    pub backlog_cost: Decimal,
    /// Weeks of demand the built-in policy aims to hold.
    pub target_coverage: f64,
    /// Supplier of this actor. `None` marks the source tier.
    pub upstream: Option<Actor>,
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Stock position of one actor for one week.
///
/// Created by the orchestrator with the previous week's stock and backlog;
/// settled exactly once by the inventory update rule, which records the
/// flows it applied and sets `processed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// Owning actor.
    pub actor: Actor,
    /// Week this snapshot belongs to.
    pub week: u32,
    /// Units on hand.
    pub stock: u32,
    /// Units owed downstream.
    pub backlog: u32,
    /// Units received this week (zero until processed).
    pub arrivals: u32,
    /// Units demanded this week (zero until processed).
    pub demand: u32,
    /// Set once the week's arrivals and demand have been applied.
    pub processed: bool,
}

impl InventorySnapshot {
    /// An unprocessed snapshot carrying forward the given position.
    pub const fn opening(actor: Actor, week: u32, stock: u32, backlog: u32) -> Self {
        Self {
            actor,
            week,
            stock,
            backlog,
            arrivals: 0,
            demand: 0,
            processed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Demand, orders and shipments
// ---------------------------------------------------------------------------

/// End-customer demand seen by the retailer in one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDemand {
    /// Week the demand occurs in.
    pub week: u32,
    /// Units demanded.
    pub quantity: u32,
}

/// A replenishment order placed with a supplier.
///
/// The source tier places production orders addressed to itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Week the order was placed.
    pub week: u32,
    /// Ordering actor.
    pub placed_by: Actor,
    /// Supplying actor.
    pub received_by: Actor,
    /// Units ordered.
    pub quantity: u32,
    /// Ratio of this order to its demand baseline, once measured.
    pub amplification: Option<f64>,
}

impl Order {
    /// Whether this is a production order of the source tier.
    pub fn is_production(&self) -> bool {
        self.placed_by == self.received_by
    }
}

/// Goods dispatched from a supplier towards a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    /// Week the goods were dispatched.
    pub week: u32,
    /// Dispatching actor.
    pub shipped_from: Actor,
    /// Receiving actor.
    pub shipped_to: Actor,
    /// Units shipped.
    pub quantity: u32,
    /// Week the goods arrive at `shipped_to`.
    pub arrival_week: u32,
}

// ---------------------------------------------------------------------------
// Metrics and cost
// ---------------------------------------------------------------------------

/// Derived per-actor metrics for one week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorMetrics {
    /// Owning actor.
    pub actor: Actor,
    /// Week these metrics describe.
    pub week: u32,
    /// Smoothed perceived demand per week.
    pub demand_rate: f64,
    /// Weeks of demand the current stock covers; `None` when the demand
    /// rate is zero.
    pub inventory_coverage: Option<f64>,
    /// Order quantity derived by the decision policy.
    pub suggested_order_quantity: u32,
    /// Orders are amplified relative to demand.
    pub bullwhip_risk: bool,
    /// Stock will not last the replenishment horizon.
    pub stockout_risk: bool,
    /// Coverage has been derived for this week.
    pub coverage_calculated: bool,
    /// The decision policy has been consulted for this week.
    pub order_policy_calculated: bool,
}

impl ActorMetrics {
    /// Fresh metrics carrying forward a demand rate.
    pub const fn opening(actor: Actor, week: u32, demand_rate: f64) -> Self {
        Self {
            actor,
            week,
            demand_rate,
            inventory_coverage: None,
            suggested_order_quantity: 0,
            bullwhip_risk: false,
            stockout_risk: false,
            coverage_calculated: false,
            order_policy_calculated: false,
        }
    }
}

/// Running cost total of one actor over all processed weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostTotal {
    /// Owning actor.
    pub actor: Actor,
    /// Sum of holding and backlog cost.
    pub total: Decimal,
    /// Latest processed week included in the total.
    pub through_week: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_orders_are_self_addressed() {
        let order = Order {
            week: 1,
            placed_by: Actor::Factory,
            received_by: Actor::Factory,
            quantity: 4,
            amplification: None,
        };
        assert!(order.is_production());
        let replenishment = Order {
            placed_by: Actor::Distributor,
            ..order
        };
        assert!(!replenishment.is_production());
    }

    #[test]
    fn opening_snapshot_is_unprocessed() {
        let snapshot = InventorySnapshot::opening(Actor::Retailer, 2, 8, 1);
        assert!(!snapshot.processed);
        assert_eq!(snapshot.arrivals, 0);
        assert_eq!(snapshot.demand, 0);
    }
}
