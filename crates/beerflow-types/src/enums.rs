//! Enumeration types for the Beerflow simulation.

use core::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// One tier of the four-tier beer supply chain.
///
/// Ordered from the customer-facing tier to the source tier, so iterating
/// [`Actor::ALL`] walks the chain upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Sells to end customers; the only tier that sees customer demand.
    Retailer,
    /// Supplies the retailer.
    Wholesaler,
    /// Supplies the wholesaler.
    Distributor,
    /// Brews the beer; the source tier with no upstream supplier.
    Factory,
}

impl Actor {
    /// All actors in supply-chain order (downstream first).
    pub const ALL: [Self; 4] = [
        Self::Retailer,
        Self::Wholesaler,
        Self::Distributor,
        Self::Factory,
    ];

    /// Stable lowercase name used in partition names and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retailer => "retailer",
            Self::Wholesaler => "wholesaler",
            Self::Distributor => "distributor",
            Self::Factory => "factory",
        }
    }

    /// The upstream supplier in the classic chain, `None` for the factory.
    pub const fn default_upstream(self) -> Option<Self> {
        match self {
            Self::Retailer => Some(Self::Wholesaler),
            Self::Wholesaler => Some(Self::Distributor),
            Self::Distributor => Some(Self::Factory),
            Self::Factory => None,
        }
    }

    /// Whether this actor faces end customers directly.
    pub const fn faces_customers(self) -> bool {
        matches!(self, Self::Retailer)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Retailer => "Retailer",
            Self::Wholesaler => "Wholesaler",
            Self::Distributor => "Distributor",
            Self::Factory => "Factory",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Record kinds
// ---------------------------------------------------------------------------

/// The kind of entity a store record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Temporal anchor for one simulated week.
    Week,
    /// Per-actor stock and backlog for one week.
    Inventory,
    /// Exogenous end-customer demand (retailer only).
    CustomerDemand,
    /// A replenishment order placed upstream.
    Order,
    /// Goods dispatched downstream.
    Shipment,
    /// Per-actor derived metrics for one week.
    Metrics,
    /// Running cost total for one actor (not week-scoped).
    CostTotal,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// A risk alert raised by the analysis rules and shown to decision policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Alert {
    /// Orders are amplified relative to underlying demand.
    BullwhipRisk,
    /// Stock will not cover demand over the replenishment horizon.
    StockoutRisk,
}

impl Alert {
    /// Wire name of the alert.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BullwhipRisk => "BULLWHIP_RISK",
            Self::StockoutRisk => "STOCKOUT_RISK",
        }
    }
}

// ---------------------------------------------------------------------------
// Demand patterns
// ---------------------------------------------------------------------------

/// Shape of the exogenous customer demand series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandPattern {
    /// Constant base demand every week.
    #[default]
    Stable,
    /// Base demand with a single spike week.
    Spike,
    /// Demand grows linearly from the base.
    Increasing,
    /// High demand on even weeks, base demand on odd weeks.
    Alternating,
    /// Uniformly random demand within configured bounds.
    Random,
}

impl DemandPattern {
    /// Parse a pattern name as used in configuration and environment
    /// variables. Unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "stable" => Some(Self::Stable),
            "spike" => Some(Self::Spike),
            "increasing" => Some(Self::Increasing),
            "alternating" => Some(Self::Alternating),
            "random" => Some(Self::Random),
            _ => None,
        }
    }

    /// Configuration name of the pattern.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Spike => "spike",
            Self::Increasing => "increasing",
            Self::Alternating => "alternating",
            Self::Random => "random",
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// The nine weekly transition rules, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Rule 1: exponential smoothing of the perceived demand rate.
    DemandRateSmoothing,
    /// Rule 2: settle stock and backlog against arrivals and demand.
    InventoryUpdate,
    /// Rule 3: weeks of demand the current stock covers.
    InventoryCoverage,
    /// Rule 4: flag coverage below the replenishment horizon.
    StockoutRiskDetection,
    /// Rule 5: consult the decision policy for an order quantity.
    OrderUpToPolicy,
    /// Rule 6: materialize the suggested order.
    CreateOrders,
    /// Rule 7: ship against orders received this week.
    CreateShipments,
    /// Rule 8: flag amplified orders.
    BullwhipDetection,
    /// Rule 9: recompute the running cost total.
    TotalCostCalculation,
}

impl RuleKind {
    /// Human-readable rule name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DemandRateSmoothing => "DEMAND RATE SMOOTHING",
            Self::InventoryUpdate => "UPDATE INVENTORY",
            Self::InventoryCoverage => "INVENTORY COVERAGE CALCULATION",
            Self::StockoutRiskDetection => "STOCKOUT RISK DETECTION",
            Self::OrderUpToPolicy => "ORDER-UP-TO POLICY",
            Self::CreateOrders => "CREATE ORDERS",
            Self::CreateShipments => "CREATE SHIPMENTS",
            Self::BullwhipDetection => "BULLWHIP DETECTION",
            Self::TotalCostCalculation => "TOTAL COST CALCULATION",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
