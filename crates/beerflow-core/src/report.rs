//! End-of-run report built from the collected week summaries.

use beerflow_types::{Actor, PerActor, SimulationId};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::orchestrator::WeekSummary;

/// Aggregate results of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// The run reported on.
    pub simulation_id: SimulationId,
    /// Weeks covered.
    pub weeks: u32,
    /// Each actor's running cost total after the last week.
    pub final_costs: PerActor<Decimal>,
    /// Sum of the final costs.
    pub total_cost: Decimal,
    /// Share of weeks the retailer ended without backlog, in `[0, 1]`.
    pub retailer_service_level: f64,
    /// Mean end-of-week stock over every actor and week.
    pub average_inventory: f64,
    /// Backlog across all actors after the last week.
    pub final_total_backlog: u32,
    /// Rule applications that failed over the whole run.
    pub failed_rules: u32,
}

impl SimulationReport {
    /// Aggregate `summaries`, oldest first.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn from_summaries(simulation_id: SimulationId, summaries: &[WeekSummary]) -> Self {
        let weeks = u32::try_from(summaries.len()).unwrap_or(u32::MAX);
        let last = summaries.last();

        let final_costs = PerActor::from_fn(|actor| {
            last.map_or(Decimal::ZERO, |s| s.actors.get(actor).total_cost)
        });
        let total_cost = final_costs
            .iter()
            .fold(Decimal::ZERO, |acc, (_, cost)| acc.saturating_add(*cost));

        let served = summaries
            .iter()
            .filter(|s| s.actors.get(Actor::Retailer).backlog == 0)
            .count();
        let retailer_service_level = if summaries.is_empty() {
            0.0
        } else {
            ratio(served, summaries.len())
        };

        let stock_weeks: u64 = summaries
            .iter()
            .flat_map(|s| s.actors.iter().map(|(_, a)| u64::from(a.inventory)))
            .sum();
        let observations = summaries.len().saturating_mul(Actor::ALL.len());
        let average_inventory = if observations == 0 {
            0.0
        } else {
            to_f64(stock_weeks) / to_f64(count(observations))
        };

        let final_total_backlog = last.map_or(0, |s| {
            s.actors
                .iter()
                .fold(0, |acc: u32, (_, a)| acc.saturating_add(a.backlog))
        });
        let failed_rules = summaries
            .iter()
            .fold(0, |acc: u32, s| acc.saturating_add(s.failed));

        Self {
            simulation_id,
            weeks,
            final_costs,
            total_cost,
            retailer_service_level,
            average_inventory,
            final_total_backlog,
            failed_rules,
        }
    }

    /// Log the report at `info`.
    pub fn log(&self) {
        info!(
            simulation_id = %self.simulation_id,
            weeks = self.weeks,
            total_cost = %self.total_cost,
            retailer_cost = %self.final_costs.retailer,
            wholesaler_cost = %self.final_costs.wholesaler,
            distributor_cost = %self.final_costs.distributor,
            factory_cost = %self.final_costs.factory,
            service_level = self.retailer_service_level,
            average_inventory = self.average_inventory,
            final_backlog = self.final_total_backlog,
            failed_rules = self.failed_rules,
            "Simulation ended"
        );
    }
}

#[allow(clippy::cast_precision_loss)]
const fn to_f64(value: u64) -> f64 {
    value as f64
}

fn count(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[allow(clippy::arithmetic_side_effects)]
fn ratio(part: usize, whole: usize) -> f64 {
    to_f64(count(part)) / to_f64(count(whole))
}
