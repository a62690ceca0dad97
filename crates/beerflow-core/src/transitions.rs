//! Pure state-transition functions behind the weekly rules.
//!
//! Each function computes a new value from explicit inputs and never
//! touches the store. The rule pipeline reads the inputs, calls these, and
//! commits the result with a single conditional replace. The only rounding
//! anywhere is the explicit `ceil` of the order-up-to quantity.

use beerflow_types::{ActorProfile, InventorySnapshot};
use rust_decimal::Decimal;

/// Weight of the newest observation in demand smoothing.
pub const SMOOTHING_ALPHA: f64 = 0.3;

/// Weight of the previous rate in demand smoothing.
pub const SMOOTHING_RETAIN: f64 = 0.7;

/// Relative change below which a smoothed rate is not updated.
pub const SMOOTHING_THRESHOLD: f64 = 0.05;

/// Order-to-baseline ratio above which bullwhip risk is raised.
pub const BULLWHIP_THRESHOLD: f64 = 1.3;

/// Exponentially smooth the perceived demand rate.
///
/// Returns `old` unchanged when the smoothed value differs from it by no
/// more than [`SMOOTHING_THRESHOLD`] relative to `old`. An `old` rate of
/// zero always takes the smoothed value.
#[allow(clippy::arithmetic_side_effects)]
pub fn smooth_demand_rate(old: f64, observed: u32) -> f64 {
    let smoothed = SMOOTHING_ALPHA * f64::from(observed) + SMOOTHING_RETAIN * old;
    if old <= 0.0 || ((smoothed - old).abs() / old) > SMOOTHING_THRESHOLD {
        smoothed
    } else {
        old
    }
}

/// Settle a week's arrivals and demand against the opening position.
///
/// Demand not covered by stock on hand plus arrivals becomes backlog;
/// backlog from earlier weeks is served first.
pub const fn settle_inventory(
    opening: &InventorySnapshot,
    arrivals: u32,
    demand: u32,
) -> InventorySnapshot {
    let available = opening.stock.saturating_add(arrivals);
    let need = demand.saturating_add(opening.backlog);
    InventorySnapshot {
        actor: opening.actor,
        week: opening.week,
        stock: available.saturating_sub(need),
        backlog: need.saturating_sub(available),
        arrivals,
        demand,
        processed: true,
    }
}

/// Whether `settled` follows from `opening` under the settlement rule.
///
/// Checks `stock - backlog` moved by exactly `arrivals - demand` and that
/// stock and backlog are never both non-zero.
#[allow(clippy::arithmetic_side_effects)]
pub fn conserves_inventory(opening: &InventorySnapshot, settled: &InventorySnapshot) -> bool {
    let net = |stock: u32, backlog: u32| i64::from(stock) - i64::from(backlog);
    let expected = net(opening.stock, opening.backlog) + i64::from(settled.arrivals)
        - i64::from(settled.demand);
    net(settled.stock, settled.backlog) == expected && (settled.stock == 0 || settled.backlog == 0)
}

/// Weeks of demand `stock` covers at `demand_rate`, undefined for a zero
/// rate.
#[allow(clippy::arithmetic_side_effects)]
pub fn inventory_coverage(stock: u32, demand_rate: f64) -> Option<f64> {
    (demand_rate > 0.0).then(|| f64::from(stock) / demand_rate)
}

/// Stock will not last `horizon_weeks`. Undefined coverage is never a
/// risk.
pub fn stockout_risk(coverage: Option<f64>, horizon_weeks: u32) -> bool {
    coverage.is_some_and(|c| c < f64::from(horizon_weeks))
}

/// Intermediate values of one order-up-to calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderUpTo {
    /// `demand_rate * target_coverage`.
    pub target: f64,
    /// `target - stock + backlog`, before clamping.
    pub gap: f64,
    /// `ceil(max(gap, 0))`.
    pub quantity: u32,
}

/// Order enough to bring stock net of backlog up to `target_coverage`
/// weeks of demand.
#[allow(clippy::arithmetic_side_effects)]
pub fn order_up_to(demand_rate: f64, target_coverage: f64, stock: u32, backlog: u32) -> OrderUpTo {
    let target = demand_rate * target_coverage;
    let gap = target - f64::from(stock) + f64::from(backlog);
    OrderUpTo {
        target,
        gap,
        quantity: ceil_units(gap.max(0.0)),
    }
}

/// Round a non-negative quantity up to whole units, saturating at
/// `u32::MAX`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ceil_units(value: f64) -> u32 {
    let ceiled = value.ceil();
    if !ceiled.is_finite() || ceiled <= 0.0 {
        0
    } else if ceiled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        ceiled as u32
    }
}

/// Ratio of an order to its demand baseline, undefined for a zero
/// baseline.
#[allow(clippy::arithmetic_side_effects)]
pub fn amplification(order_quantity: u32, baseline: f64) -> Option<f64> {
    (baseline > 0.0).then(|| f64::from(order_quantity) / baseline)
}

/// Orders exceed [`BULLWHIP_THRESHOLD`] times the baseline. A ratio of
/// exactly the threshold is not a risk.
pub fn bullwhip_risk(ratio: Option<f64>) -> bool {
    ratio.is_some_and(|r| r > BULLWHIP_THRESHOLD)
}

/// Holding plus backlog cost of one settled week.
pub fn week_cost(snapshot: &InventorySnapshot, profile: &ActorProfile) -> Decimal {
    let holding = Decimal::from(snapshot.stock).saturating_mul(profile.holding_cost);
    let shortage = Decimal::from(snapshot.backlog).saturating_mul(profile.backlog_cost);
    holding.saturating_add(shortage)
}

/// Cost over every processed snapshot; unprocessed ones contribute nothing.
pub fn total_cost<'a>(
    snapshots: impl IntoIterator<Item = &'a InventorySnapshot>,
    profile: &ActorProfile,
) -> Decimal {
    snapshots
        .into_iter()
        .filter(|s| s.processed)
        .fold(Decimal::ZERO, |acc, s| acc.saturating_add(week_cost(s, profile)))
}
