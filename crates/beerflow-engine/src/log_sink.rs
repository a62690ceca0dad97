//! Report sink that writes each week summary to the log.

use beerflow_core::orchestrator::{ReportSink, WeekSummary};
use tracing::{debug, info, warn};

/// Logs one line per actor per week, plus the full summary at `debug`.
#[derive(Debug, Default)]
pub struct LogSink {
    weeks: u32,
}

impl LogSink {
    /// Weeks emitted so far.
    pub const fn weeks(&self) -> u32 {
        self.weeks
    }
}

impl ReportSink for LogSink {
    fn emit(&mut self, summary: &WeekSummary) {
        self.weeks = self.weeks.saturating_add(1);
        for (actor, position) in summary.actors.iter() {
            info!(
                week = summary.week,
                actor = %actor,
                inventory = position.inventory,
                backlog = position.backlog,
                coverage = position.coverage,
                demand_rate = position.demand_rate,
                suggested_order = position.suggested_order,
                bullwhip = position.bullwhip_risk,
                stockout = position.stockout_risk,
                total_cost = %position.total_cost,
                "Actor position"
            );
        }
        for failure in &summary.failures {
            warn!(
                week = failure.week,
                actor = %failure.actor,
                rule = %failure.rule,
                attempts = failure.attempts,
                error = %failure.error,
                "Rule failed this week"
            );
        }
        match serde_json::to_string(summary) {
            Ok(json) => debug!(week = summary.week, summary = %json, "Week summary"),
            Err(err) => warn!(week = summary.week, error = %err, "Week summary not serializable"),
        }
    }
}
