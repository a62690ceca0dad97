//! Week orchestrator: the forward-only state machine around the pipeline.
//!
//! Each week passes through four phases in order:
//!
//! ```text
//! AnchorCreated -> DemandInjected -> RulesApplied -> SummaryCollected
//! ```
//!
//! - **`AnchorCreated`**: the week anchor is written to every partition
//!   together with the opening inventory snapshot and metrics, carried
//!   forward from the previous week. Week 1 is seeded from the `initial`
//!   configuration, including the week-0 pipeline of orders and shipments.
//! - **`DemandInjected`**: the retailer's customer demand is written.
//! - **`RulesApplied`**: the [`RulePipeline`] runs the nine rules.
//! - **`SummaryCollected`**: per-actor state is read back, checked for
//!   inventory conservation, and handed to the [`ReportSink`].
//!
//! Week N+1 never starts before week N reaches `SummaryCollected`. Nothing
//! is rolled back: a week that fails part way keeps its writes.

use core::future::Future;
use std::sync::Arc;

use beerflow_store::{Mutation, PartitionRegistry, Record, StoreError, TemporalStore, UpdateOutcome};
use beerflow_types::{
    Actor, ActorMetrics, CustomerDemand, DecisionRecord, InventorySnapshot, Order, PerActor,
    Shipment, SimulationId, Week,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, InitialConfig, SimulationConfig};
use crate::demand::DemandGenerator;
use crate::pipeline::{PipelineReport, PipelineSettings, RuleFailure, RulePipeline};
use crate::policy::DecisionPolicy;
use crate::report::SimulationReport;
use crate::topology::Topology;
use crate::transitions::conserves_inventory;

/// Errors that stop the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The configuration could not be turned into a pipeline.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// A phase write or read failed after all attempts.
    #[error("week {week} {phase:?} failed: {source}")]
    Store {
        /// Week being processed.
        week: u32,
        /// Phase that failed.
        phase: WeekPhase,
        /// The underlying store error.
        source: StoreError,
    },

    /// A week was requested out of sequence.
    #[error("week {requested} requested but week {expected} is next")]
    OutOfSequence {
        /// The week asked for.
        requested: u32,
        /// The only week that may run next.
        expected: u32,
    },
}

/// Phases of one simulated week, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum WeekPhase {
    /// Week anchor and opening records written.
    AnchorCreated,
    /// Customer demand written.
    DemandInjected,
    /// The nine rules applied.
    RulesApplied,
    /// Summary read back and emitted.
    SummaryCollected,
}

/// One actor's position at the end of a week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorSummary {
    /// Units on hand.
    pub inventory: u32,
    /// Units owed.
    pub backlog: u32,
    /// Weeks of demand the stock covers.
    pub coverage: Option<f64>,
    /// Smoothed demand rate.
    pub demand_rate: f64,
    /// Order quantity the policy suggested.
    pub suggested_order: u32,
    /// Units ordered this week.
    pub orders_placed: u32,
    /// Units customers ordered from this actor this week.
    pub orders_received: u32,
    /// Units shipped this week.
    pub shipments_created: u32,
    /// Bullwhip risk raised this week.
    pub bullwhip_risk: bool,
    /// Stockout risk raised this week.
    pub stockout_risk: bool,
    /// Running cost total.
    pub total_cost: Decimal,
    /// Inventory was settled this week.
    pub settled: bool,
    /// Settlement agrees with the previous week's closing position.
    pub conserved: bool,
}

/// Structured summary of one completed week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    /// Run the week belongs to.
    pub simulation_id: SimulationId,
    /// Week number.
    pub week: u32,
    /// Retailer customer demand, if it was injected.
    pub customer_demand: Option<u32>,
    /// Per-actor positions.
    pub actors: PerActor<ActorSummary>,
    /// Rule applications that wrote an effect.
    pub executed: u32,
    /// Rule applications that found nothing to do.
    pub skipped: u32,
    /// Rule applications that failed.
    pub failed: u32,
    /// Details of every failed rule application.
    pub failures: Vec<RuleFailure>,
    /// Policy consultations made this week.
    pub decisions: Vec<DecisionRecord>,
}

/// Receives each week's summary as soon as it is collected.
pub trait ReportSink: Send {
    /// Called once per completed week.
    fn emit(&mut self, summary: &WeekSummary);
}

/// A sink that discards every summary.
pub struct NoOpSink;

impl ReportSink for NoOpSink {
    fn emit(&mut self, _summary: &WeekSummary) {}
}

/// Drives the simulation one week at a time.
pub struct WeekOrchestrator<S> {
    id: SimulationId,
    pipeline: RulePipeline<S>,
    demand: DemandGenerator,
    initial: InitialConfig,
    weeks: u32,
    completed: u32,
    phase: Option<WeekPhase>,
    history: Vec<WeekSummary>,
}

impl<S: TemporalStore> WeekOrchestrator<S> {
    /// Orchestrate `pipeline` for `weeks` weeks.
    pub fn new(
        pipeline: RulePipeline<S>,
        demand: DemandGenerator,
        initial: InitialConfig,
        weeks: u32,
    ) -> Self {
        Self {
            id: SimulationId::new(),
            pipeline,
            demand,
            initial,
            weeks,
            completed: 0,
            phase: None,
            history: Vec::new(),
        }
    }

    /// Wire store, partitions, topology, demand and settings from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] if the configured topology is
    /// invalid.
    pub fn from_config(
        store: Arc<S>,
        config: &SimulationConfig,
        policy: Arc<dyn DecisionPolicy>,
    ) -> Result<Self, OrchestratorError> {
        let topology = Topology::new(config.profiles())?;
        let registry = PartitionRegistry::with_prefix(&config.partitions.prefix);
        let pipeline = RulePipeline::new(
            store,
            registry,
            topology,
            policy,
            PipelineSettings::from_config(config),
        );
        let demand = DemandGenerator::new(config.demand.clone(), config.simulation.seed);
        Ok(Self::new(
            pipeline,
            demand,
            config.initial.clone(),
            config.simulation.weeks,
        ))
    }

    /// Identifier of this run.
    pub const fn id(&self) -> SimulationId {
        self.id
    }

    /// The rule pipeline this orchestrator drives.
    pub const fn pipeline(&self) -> &RulePipeline<S> {
        &self.pipeline
    }

    /// Last week that reached `SummaryCollected`, or 0.
    pub const fn completed_weeks(&self) -> u32 {
        self.completed
    }

    /// Phase reached by the week in progress or last completed.
    pub const fn phase(&self) -> Option<WeekPhase> {
        self.phase
    }

    /// Summaries collected so far, oldest first.
    pub fn history(&self) -> &[WeekSummary] {
        &self.history
    }

    // =========================================================================
    // Run control
    // =========================================================================

    /// Run every remaining week up to the configured length.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] if a phase outside the rule pipeline
    /// fails. Rule failures are counted in the summaries instead.
    pub async fn run(
        &mut self,
        sink: &mut dyn ReportSink,
    ) -> Result<SimulationReport, OrchestratorError> {
        info!(
            simulation_id = %self.id,
            weeks = self.weeks,
            pattern = self.demand.pattern().as_str(),
            policy = self.pipeline.policy.name(),
            first_week = self.completed.saturating_add(1),
            "Simulation starting"
        );
        while self.completed < self.weeks {
            let week = self.completed.saturating_add(1);
            let summary = self.run_week(week).await?;
            sink.emit(&summary);
        }
        Ok(SimulationReport::from_summaries(self.id, &self.history))
    }

    /// Continue from the highest week already anchored in the store.
    ///
    /// Weeks before it are read back into the history so the final report
    /// covers the whole run. The anchored week itself is run again, since
    /// it may have stopped before its rules or summary; its anchor, demand
    /// and settled rules are skipped on the second pass. A run already at
    /// its target re-runs only its last week.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] if the store cannot be read or a
    /// later week fails.
    pub async fn resume(
        &mut self,
        sink: &mut dyn ReportSink,
    ) -> Result<SimulationReport, OrchestratorError> {
        let reader = self.pipeline.reader();
        let latest = self
            .retrying(0, WeekPhase::SummaryCollected, || reader.latest_week())
            .await?
            .unwrap_or(0);
        if latest > self.completed {
            let settled = latest.saturating_sub(1);
            info!(latest, settled, "Resuming from existing weeks");
            self.history.clear();
            for week in 1..=settled {
                let summary = self.collect_summary(week, PipelineReport::default()).await?;
                self.history.push(summary);
            }
            self.completed = settled;
            self.phase = (settled > 0).then_some(WeekPhase::SummaryCollected);
        }
        self.run(sink).await
    }

    /// Run the next week through all four phases.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::OutOfSequence`] unless `week` is the
    /// week after the last completed one.
    pub async fn run_week(&mut self, week: u32) -> Result<WeekSummary, OrchestratorError> {
        let expected = self.completed.saturating_add(1);
        if week != expected {
            return Err(OrchestratorError::OutOfSequence {
                requested: week,
                expected,
            });
        }

        self.create_anchor(week).await?;
        self.advance(week, WeekPhase::AnchorCreated);

        self.inject_demand(week).await?;
        self.advance(week, WeekPhase::DemandInjected);

        let report = self.apply_rules(week).await;
        self.advance(week, WeekPhase::RulesApplied);

        let summary = self.collect_summary(week, report).await?;
        self.advance(week, WeekPhase::SummaryCollected);

        info!(
            week,
            customer_demand = summary.customer_demand,
            executed = summary.executed,
            failed = summary.failed,
            retailer_stock = summary.actors.retailer.inventory,
            retailer_backlog = summary.actors.retailer.backlog,
            "Week complete"
        );
        self.completed = week;
        self.history.push(summary.clone());
        Ok(summary)
    }

    fn advance(&mut self, week: u32, phase: WeekPhase) {
        debug!(week, phase = ?phase, "Week phase reached");
        self.phase = Some(phase);
    }

    // =========================================================================
    // Phases
    // =========================================================================

    /// Write the week anchor and opening records in every partition.
    ///
    /// Existing records are left alone, so anchoring twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] if a write fails after all
    /// attempts.
    pub async fn create_anchor(&self, week: u32) -> Result<(), OrchestratorError> {
        let phase = WeekPhase::AnchorCreated;
        if week <= 1 {
            self.seed_pipeline(week).await?;
        }
        for actor in Actor::ALL {
            let (stock, backlog, demand_rate) = self.opening_position(actor, week).await?;
            let records = [
                Record::Week(Week::new(week)),
                Record::Inventory(InventorySnapshot::opening(actor, week, stock, backlog)),
                Record::Metrics(ActorMetrics::opening(actor, week, demand_rate)),
            ];
            for record in records {
                self.create_once(week, phase, actor, record).await?;
            }
        }
        debug!(week, "Week anchored");
        Ok(())
    }

    /// Stock, backlog and demand rate carried into `week`.
    ///
    /// Missing predecessors fall back to the initial position.
    async fn opening_position(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<(u32, u32, f64), OrchestratorError> {
        let phase = WeekPhase::AnchorCreated;
        let Some(previous) = week.checked_sub(1).filter(|p| *p > 0) else {
            return Ok((
                self.initial.stock,
                self.initial.backlog,
                self.initial.demand_rate,
            ));
        };
        let reader = self.pipeline.reader();
        let snapshot = self
            .retrying(week, phase, || reader.inventory(actor, previous))
            .await?;
        let metrics = self
            .retrying(week, phase, || reader.metrics(actor, previous))
            .await?;
        if snapshot.is_none() || metrics.is_none() {
            warn!(week, actor = %actor, "Previous week missing, opening from initial position");
        }
        Ok((
            snapshot.map_or(self.initial.stock, |s| s.stock),
            snapshot.map_or(self.initial.backlog, |s| s.backlog),
            metrics.map_or(self.initial.demand_rate, |m| m.demand_rate),
        ))
    }

    /// Week-0 orders and in-transit shipments so deliveries start flowing
    /// in the first weeks.
    async fn seed_pipeline(&self, week: u32) -> Result<(), OrchestratorError> {
        let quantity = self.initial.pipeline;
        if quantity == 0 {
            return Ok(());
        }
        let phase = WeekPhase::AnchorCreated;
        let topology = self.pipeline.topology();
        for actor in Actor::ALL {
            let supplier = topology.supplier_of(actor);
            let shipment = Shipment {
                week: 0,
                shipped_from: supplier,
                shipped_to: actor,
                quantity,
                arrival_week: topology.profile(supplier).lead_time,
            };
            self.create_once(week, phase, supplier, Record::Shipment(shipment))
                .await?;

            if !topology.is_source(actor) {
                let order = Order {
                    week: 0,
                    placed_by: actor,
                    received_by: supplier,
                    quantity,
                    amplification: None,
                };
                self.create_once(week, phase, actor, Record::Order(order))
                    .await?;
            }
        }
        debug!(quantity, "Initial pipeline seeded");
        Ok(())
    }

    /// Write this week's retailer customer demand.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] if the write fails after all
    /// attempts.
    pub async fn inject_demand(&self, week: u32) -> Result<u32, OrchestratorError> {
        let quantity = self.demand.demand_for(week);
        let record = Record::CustomerDemand(CustomerDemand { week, quantity });
        self.create_once(week, WeekPhase::DemandInjected, Actor::Retailer, record)
            .await?;
        info!(week, quantity, pattern = self.demand.pattern().as_str(), "Customer demand injected");
        Ok(quantity)
    }

    /// Run the rule pipeline for `week`.
    pub async fn apply_rules(&self, week: u32) -> PipelineReport {
        self.pipeline.run_week(week).await
    }

    /// Read every actor's end-of-week position.
    ///
    /// Each settled snapshot is checked against the previous week's
    /// closing position; a mismatch is logged and flagged, not fatal.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] if a read fails after all
    /// attempts.
    pub async fn collect_summary(
        &self,
        week: u32,
        report: PipelineReport,
    ) -> Result<WeekSummary, OrchestratorError> {
        let phase = WeekPhase::SummaryCollected;
        let reader = self.pipeline.reader();
        let customer_demand = self
            .retrying(week, phase, || reader.customer_demand(week))
            .await?;

        let mut actors = PerActor::from_fn(|_| ActorSummary::empty());
        for actor in Actor::ALL {
            *actors.get_mut(actor) = self.actor_summary(actor, week).await?;
        }

        Ok(WeekSummary {
            simulation_id: self.id,
            week,
            customer_demand,
            actors,
            executed: report.executed,
            skipped: report.skipped,
            failed: report.failed,
            failures: report.failures,
            decisions: report.decisions,
        })
    }

    async fn actor_summary(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<ActorSummary, OrchestratorError> {
        let phase = WeekPhase::SummaryCollected;
        let reader = self.pipeline.reader();
        let snapshot = self
            .retrying(week, phase, || reader.inventory(actor, week))
            .await?;
        let metrics = self
            .retrying(week, phase, || reader.metrics(actor, week))
            .await?;
        let placed = self.retrying(week, phase, || reader.order(actor, week)).await?;
        let received = self
            .retrying(week, phase, || reader.orders_addressed_to(actor, week))
            .await?;
        let shipped = self
            .retrying(week, phase, || reader.shipments_from(actor, week))
            .await?;
        let cost = self.retrying(week, phase, || reader.cost_total(actor)).await?;
        let (opening_stock, opening_backlog, _) = self.opening_position(actor, week).await?;

        let settled = snapshot.is_some_and(|s| s.processed);
        let conserved = snapshot.is_none_or(|s| {
            !s.processed
                || conserves_inventory(
                    &InventorySnapshot::opening(actor, week, opening_stock, opening_backlog),
                    &s,
                )
        });
        if !conserved {
            warn!(
                week,
                actor = %actor,
                opening_stock,
                opening_backlog,
                "Inventory conservation violated"
            );
        }

        Ok(ActorSummary {
            inventory: snapshot.map_or(0, |s| s.stock),
            backlog: snapshot.map_or(0, |s| s.backlog),
            coverage: metrics.and_then(|m| m.inventory_coverage),
            demand_rate: metrics.map_or(0.0, |m| m.demand_rate),
            suggested_order: metrics.map_or(0, |m| m.suggested_order_quantity),
            orders_placed: placed.map_or(0, |o| o.quantity),
            orders_received: received
                .iter()
                .filter(|o| !o.is_production())
                .fold(0, |acc, o| acc.saturating_add(o.quantity)),
            shipments_created: shipped.iter().fold(0, |acc, s| acc.saturating_add(s.quantity)),
            bullwhip_risk: metrics.is_some_and(|m| m.bullwhip_risk),
            stockout_risk: metrics.is_some_and(|m| m.stockout_risk),
            total_cost: cost.map_or(Decimal::ZERO, |c| c.total),
            settled,
            conserved,
        })
    }

    // =========================================================================
    // Store helpers
    // =========================================================================

    async fn create_once(
        &self,
        week: u32,
        phase: WeekPhase,
        actor: Actor,
        record: Record,
    ) -> Result<(), OrchestratorError> {
        let partition = self.pipeline.registry().partition(actor);
        let store = &self.pipeline.store;
        let outcome = self
            .retrying(week, phase, || store.update(partition, Mutation::create(record)))
            .await?;
        if outcome == UpdateOutcome::ConditionFailed {
            debug!(week, actor = %actor, kind = ?record.kind(), "Record already present");
        }
        Ok(())
    }

    /// Run a store call under the pipeline's deadline and retry budget.
    async fn retrying<T, F, Fut>(
        &self,
        week: u32,
        phase: WeekPhase,
        mut op: F,
    ) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let settings = self.pipeline.settings();
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let result = match tokio::time::timeout(settings.store_timeout, op()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(StoreError::Timeout {
                    millis: u64::try_from(settings.store_timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < settings.max_attempts => {
                    warn!(week, phase = ?phase, attempt, error = %err, "Store call failed, retrying");
                    tokio::time::sleep(settings.retry_backoff).await;
                }
                Err(source) => {
                    return Err(OrchestratorError::Store {
                        week,
                        phase,
                        source,
                    });
                }
            }
        }
    }
}

impl ActorSummary {
    fn empty() -> Self {
        Self {
            inventory: 0,
            backlog: 0,
            coverage: None,
            demand_rate: 0.0,
            suggested_order: 0,
            orders_placed: 0,
            orders_received: 0,
            shipments_created: 0,
            bullwhip_risk: false,
            stockout_risk: false,
            total_cost: Decimal::ZERO,
            settled: false,
            conserved: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use beerflow_store::InMemoryStore;

    use super::*;
    use crate::policy::OrderUpToPolicy;

    fn orchestrator(config: &SimulationConfig) -> WeekOrchestrator<InMemoryStore> {
        let registry = PartitionRegistry::with_prefix(&config.partitions.prefix);
        let store = Arc::new(InMemoryStore::new(registry));
        WeekOrchestrator::from_config(store, config, Arc::new(OrderUpToPolicy::from_config(config)))
            .unwrap()
    }

    #[tokio::test]
    async fn weeks_must_run_in_order() {
        let mut orchestrator = orchestrator(&SimulationConfig::default());
        let err = orchestrator.run_week(2).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::OutOfSequence {
                requested: 2,
                expected: 1
            }
        ));
        orchestrator.run_week(1).await.unwrap();
        assert_eq!(orchestrator.completed_weeks(), 1);
        assert_eq!(orchestrator.phase(), Some(WeekPhase::SummaryCollected));
    }

    #[tokio::test]
    async fn anchor_seeds_week_zero_pipeline() {
        let orchestrator = orchestrator(&SimulationConfig::default());
        orchestrator.create_anchor(1).await.unwrap();
        let reader = orchestrator.pipeline().reader();

        let to_wholesaler = reader.orders_addressed_to(Actor::Wholesaler, 0).await.unwrap();
        assert_eq!(to_wholesaler.len(), 1);
        assert_eq!(to_wholesaler.first().unwrap().quantity, 4);
        assert_eq!(reader.orders_addressed_to(Actor::Factory, 0).await.unwrap().len(), 1);

        let arriving = reader.arrivals(Actor::Factory, 2).await.unwrap();
        assert_eq!(arriving.len(), 1);
        assert_eq!(arriving.first().unwrap().shipped_from, Actor::Factory);

        let opening = reader.inventory(Actor::Retailer, 1).await.unwrap().unwrap();
        assert_eq!((opening.stock, opening.backlog, opening.processed), (12, 0, false));
    }

    #[tokio::test]
    async fn anchoring_twice_writes_nothing_new() {
        let orchestrator = orchestrator(&SimulationConfig::default());
        orchestrator.create_anchor(1).await.unwrap();
        let store = &orchestrator.pipeline().store;
        let before = store.record_count().await;
        orchestrator.create_anchor(1).await.unwrap();
        assert_eq!(store.record_count().await, before);
    }

    #[tokio::test]
    async fn anchor_carries_previous_close_forward() {
        let mut orchestrator = orchestrator(&SimulationConfig::default());
        orchestrator.run_week(1).await.unwrap();
        orchestrator.create_anchor(2).await.unwrap();
        let reader = orchestrator.pipeline().reader();
        let opening = reader.inventory(Actor::Retailer, 2).await.unwrap().unwrap();
        assert_eq!((opening.stock, opening.processed), (8, false));
        let metrics = reader.metrics(Actor::Retailer, 2).await.unwrap().unwrap();
        assert!((metrics.demand_rate - 4.0).abs() < 1e-9);
        assert!(!metrics.coverage_calculated);
    }

    #[tokio::test]
    async fn resume_continues_after_stored_weeks() {
        let mut config = SimulationConfig::default();
        config.simulation.weeks = 3;
        let registry = PartitionRegistry::with_prefix(&config.partitions.prefix);
        let store = Arc::new(InMemoryStore::new(registry));
        let policy: Arc<dyn DecisionPolicy> = Arc::new(OrderUpToPolicy::from_config(&config));

        let mut first =
            WeekOrchestrator::from_config(Arc::clone(&store), &config, Arc::clone(&policy)).unwrap();
        first.run_week(1).await.unwrap();
        first.run_week(2).await.unwrap();

        let mut second = WeekOrchestrator::from_config(store, &config, policy).unwrap();
        let report = second.resume(&mut NoOpSink).await.unwrap();
        assert_eq!(second.completed_weeks(), 3);
        assert_eq!(report.weeks, 3);
        assert_eq!(second.history().len(), 3);
    }
}
