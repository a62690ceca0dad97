//! End-to-end scenarios driving the week orchestrator over the in-memory
//! store.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::too_many_lines,
    clippy::missing_panics_doc
)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use beerflow_core::config::{SimulationConfig, StockoutHorizon};
use beerflow_core::orchestrator::{NoOpSink, ReportSink, WeekOrchestrator, WeekSummary};
use beerflow_core::policy::{DecisionPolicy, OrderUpToPolicy, PolicyError};
use beerflow_core::reader::StoreReader;
use beerflow_store::{
    InMemoryStore, Mutation, Partition, PartitionRegistry, Record, RecordPattern, StoreError,
    TemporalStore, UpdateOutcome,
};
use beerflow_types::{
    Actor, ActorMetrics, Decision, DemandPattern, Observation, RecordKind, RuleKind,
};
use rust_decimal::Decimal;

const EPSILON: f64 = 1e-9;

// =============================================================================
// Helpers
// =============================================================================

fn config(weeks: u32, pattern: DemandPattern) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.simulation.weeks = weeks;
    config.demand.pattern = pattern;
    config.pipeline.retry_backoff_ms = 1;
    config
}

fn memory_store(config: &SimulationConfig) -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new(PartitionRegistry::with_prefix(
        &config.partitions.prefix,
    )))
}

fn orchestrator<S: TemporalStore>(
    store: Arc<S>,
    config: &SimulationConfig,
) -> WeekOrchestrator<S> {
    let policy: Arc<dyn DecisionPolicy> = Arc::new(OrderUpToPolicy::from_config(config));
    WeekOrchestrator::from_config(store, config, policy).unwrap()
}

#[derive(Default)]
struct CollectingSink {
    summaries: Vec<WeekSummary>,
}

impl ReportSink for CollectingSink {
    fn emit(&mut self, summary: &WeekSummary) {
        self.summaries.push(summary.clone());
    }
}

/// Wraps the in-memory store and fails selected updates.
struct FlakyStore {
    inner: InMemoryStore,
    fault: Box<dyn Fn(&Partition, &Mutation) -> Option<StoreError> + Send + Sync>,
    injected: AtomicU32,
}

impl FlakyStore {
    fn new(
        config: &SimulationConfig,
        fault: impl Fn(&Partition, &Mutation) -> Option<StoreError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: InMemoryStore::new(PartitionRegistry::with_prefix(&config.partitions.prefix)),
            fault: Box::new(fault),
            injected: AtomicU32::new(0),
        }
    }
}

impl TemporalStore for FlakyStore {
    async fn query(
        &self,
        partition: &Partition,
        pattern: &RecordPattern,
    ) -> Result<Vec<Record>, StoreError> {
        self.inner.query(partition, pattern).await
    }

    async fn federated_query(&self, pattern: &RecordPattern) -> Result<Vec<Record>, StoreError> {
        self.inner.federated_query(pattern).await
    }

    async fn update(
        &self,
        partition: &Partition,
        mutation: Mutation,
    ) -> Result<UpdateOutcome, StoreError> {
        if let Some(err) = (self.fault)(partition, &mutation) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(err);
        }
        self.inner.update(partition, mutation).await
    }
}

fn inserts(mutation: &Mutation, kind: RecordKind) -> bool {
    mutation.insert.iter().any(|r| r.kind() == kind)
}

fn replaces(mutation: &Mutation, kind: RecordKind) -> bool {
    mutation.delete.iter().any(|k| k.kind == kind)
}

struct BrokenPolicy;

impl DecisionPolicy for BrokenPolicy {
    fn name(&self) -> &str {
        "broken"
    }

    fn decide(&self, _observation: &Observation) -> Result<Decision, PolicyError> {
        Err(PolicyError::Unavailable {
            reason: "agent offline".to_owned(),
        })
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn stable_demand_settles_into_steady_state() {
    let config = config(6, DemandPattern::Stable);
    let mut orchestrator = orchestrator(memory_store(&config), &config);
    let mut sink = CollectingSink::default();
    let report = orchestrator.run(&mut sink).await.unwrap();

    assert_eq!(sink.summaries.len(), 6);
    for summary in &sink.summaries {
        assert_eq!(summary.failed, 0, "week {}", summary.week);
        assert_eq!(summary.customer_demand, Some(4));
        assert_eq!(summary.decisions.len(), 4);
        let accrued = Decimal::from(summary.week).saturating_mul(Decimal::from(4));
        for (actor, position) in summary.actors.iter() {
            assert_eq!(position.inventory, 8, "{actor} week {}", summary.week);
            assert_eq!(position.backlog, 0);
            assert!((position.demand_rate - 4.0).abs() < EPSILON);
            assert!((position.coverage.unwrap() - 2.0).abs() < EPSILON);
            assert_eq!(position.suggested_order, 4);
            assert!(!position.bullwhip_risk);
            assert!(!position.stockout_risk);
            assert!(position.settled && position.conserved);
            assert_eq!(position.total_cost, accrued);
        }
    }

    assert_eq!(report.weeks, 6);
    assert_eq!(report.total_cost, Decimal::from(96));
    assert!((report.retailer_service_level - 1.0).abs() < EPSILON);
    assert!((report.average_inventory - 8.0).abs() < EPSILON);
    assert_eq!(report.final_total_backlog, 0);
}

#[tokio::test]
async fn demand_spike_propagates_upstream() {
    let config = config(4, DemandPattern::Spike);
    let store = memory_store(&config);
    let mut orchestrator = orchestrator(Arc::clone(&store), &config);
    let mut sink = CollectingSink::default();
    orchestrator.run(&mut sink).await.unwrap();

    let week3 = &sink.summaries[2];
    assert_eq!(week3.customer_demand, Some(12));
    let retailer = &week3.actors.retailer;
    assert_eq!((retailer.inventory, retailer.backlog), (0, 0));
    assert!((retailer.demand_rate - 6.4).abs() < EPSILON);
    assert_eq!(retailer.suggested_order, 20);
    assert_eq!(retailer.orders_placed, 20);
    assert!(retailer.stockout_risk);
    assert!(retailer.bullwhip_risk);
    let decision = week3
        .decisions
        .iter()
        .find(|d| d.actor == Actor::Retailer)
        .unwrap();
    assert_eq!(decision.quantity, 20);
    assert!(!decision.fallback);

    let week4 = &sink.summaries[3];
    let retailer = &week4.actors.retailer;
    assert!((retailer.demand_rate - 5.68).abs() < EPSILON);
    assert_eq!(retailer.suggested_order, 18);
    let wholesaler = &week4.actors.wholesaler;
    assert_eq!(wholesaler.orders_received, 18);
    assert_eq!((wholesaler.inventory, wholesaler.backlog), (0, 8));
    assert!((wholesaler.demand_rate - 8.8).abs() < EPSILON);
    assert_eq!(wholesaler.suggested_order, 35);
    assert_eq!(wholesaler.shipments_created, 18);
    assert!(wholesaler.bullwhip_risk);

    let registry = orchestrator.pipeline().registry().clone();
    let reader = StoreReader::new(store.as_ref(), &registry);
    let retailer_order = reader.order(Actor::Retailer, 3).await.unwrap().unwrap();
    assert_eq!(retailer_order.quantity, 20);
    let ratio = retailer_order.amplification.unwrap();
    assert!((ratio - 20.0 / 12.0).abs() < EPSILON);

    // Upstream tiers measure against their smoothed rate, not the orders
    // they received.
    let wholesaler_order = reader.order(Actor::Wholesaler, 4).await.unwrap().unwrap();
    let ratio = wholesaler_order.amplification.unwrap();
    assert!((ratio - 35.0 / 8.8).abs() < EPSILON);
}

#[tokio::test]
async fn stale_bullwhip_flag_clears_without_an_order() {
    let config = config(1, DemandPattern::Stable);
    let store = memory_store(&config);
    let mut orchestrator =
        WeekOrchestrator::from_config(Arc::clone(&store), &config, Arc::new(BrokenPolicy))
            .unwrap();
    let summary = orchestrator.run_week(1).await.unwrap();
    assert_eq!(summary.actors.retailer.orders_placed, 0);
    assert!(!summary.actors.retailer.bullwhip_risk);

    let registry = orchestrator.pipeline().registry().clone();
    let partition = registry.partition(Actor::Retailer);
    let reader = StoreReader::new(store.as_ref(), &registry);
    let metrics = reader.metrics(Actor::Retailer, 1).await.unwrap().unwrap();
    let flagged = ActorMetrics {
        bullwhip_risk: true,
        ..metrics
    };
    store
        .update(
            partition,
            Mutation::replace(Record::Metrics(metrics), Record::Metrics(flagged)),
        )
        .await
        .unwrap();

    let report = orchestrator.pipeline().run_week(1).await;
    assert_eq!(report.failed, 0);
    assert_eq!(report.executed, 1);
    let cleared = reader.metrics(Actor::Retailer, 1).await.unwrap().unwrap();
    assert!(!cleared.bullwhip_risk);
    assert!(reader.order(Actor::Retailer, 1).await.unwrap().is_none());
}

#[tokio::test]
async fn resume_reruns_a_week_that_stopped_before_its_rules() {
    let config = config(3, DemandPattern::Stable);
    let armed = Arc::new(AtomicBool::new(true));
    let fault_armed = Arc::clone(&armed);
    let store = Arc::new(FlakyStore::new(&config, move |_, mutation| {
        let week_two_demand = mutation
            .insert
            .iter()
            .any(|r| r.kind() == RecordKind::CustomerDemand && r.week() == Some(2));
        (week_two_demand && fault_armed.load(Ordering::SeqCst)).then(|| {
            StoreError::MissingRecord {
                what: "demand index".to_owned(),
            }
        })
    }));

    let mut first = orchestrator(Arc::clone(&store), &config);
    first.run_week(1).await.unwrap();
    assert!(first.run_week(2).await.is_err());
    assert_eq!(first.completed_weeks(), 1);

    armed.store(false, Ordering::SeqCst);
    let mut second = orchestrator(Arc::clone(&store), &config);
    let mut sink = CollectingSink::default();
    let report = second.resume(&mut sink).await.unwrap();

    assert_eq!(report.weeks, 3);
    assert_eq!(second.history().len(), 3);
    assert_eq!(
        sink.summaries.iter().map(|s| s.week).collect::<Vec<_>>(),
        vec![2, 3]
    );
    assert_eq!(sink.summaries[0].customer_demand, Some(4));

    let registry = second.pipeline().registry().clone();
    let reader = StoreReader::new(store.as_ref(), &registry);
    for actor in Actor::ALL {
        let history = reader.inventory_history(actor).await.unwrap();
        assert_eq!(history.len(), 3, "{actor}");
        for snapshot in history {
            assert!(snapshot.processed, "{actor} week {}", snapshot.week);
            assert_eq!(snapshot.stock, 8, "{actor} week {}", snapshot.week);
        }
    }
    assert_eq!(report.total_cost, Decimal::from(48));
}

#[tokio::test]
async fn rerunning_settled_weeks_changes_nothing() {
    let config = config(3, DemandPattern::Spike);
    let store = memory_store(&config);
    let mut orchestrator = orchestrator(Arc::clone(&store), &config);
    orchestrator.run(&mut NoOpSink).await.unwrap();

    let registry = orchestrator.pipeline().registry().clone();
    let mut revisions = Vec::new();
    for (_, partition) in registry.partitions() {
        revisions.push(store.revision(partition).await.unwrap());
    }
    let records = store.record_count().await;

    for week in 1..=3 {
        let report = orchestrator.pipeline().run_week(week).await;
        assert_eq!(report.executed, 0, "week {week}");
        assert_eq!(report.failed, 0);
        assert!(report.decisions.is_empty());
        assert_eq!(report.total(), 36);
    }

    let mut after = Vec::new();
    for (_, partition) in registry.partitions() {
        after.push(store.revision(partition).await.unwrap());
    }
    assert_eq!(revisions, after);
    assert_eq!(store.record_count().await, records);
}

#[tokio::test]
async fn inventory_is_conserved_under_random_demand() {
    let mut config = config(10, DemandPattern::Random);
    config.pipeline.stockout_horizon = StockoutHorizon::LeadTimePlusOrderDelay;
    let store = memory_store(&config);
    let mut orchestrator = orchestrator(Arc::clone(&store), &config);
    orchestrator.run(&mut NoOpSink).await.unwrap();

    let registry = orchestrator.pipeline().registry().clone();
    let reader = StoreReader::new(store.as_ref(), &registry);
    for actor in Actor::ALL {
        let history = reader.inventory_history(actor).await.unwrap();
        assert_eq!(history.len(), 10);
        let (mut stock, mut backlog) = (i64::from(config.initial.stock), 0_i64);
        for snapshot in history {
            assert!(snapshot.processed);
            assert!(snapshot.stock == 0 || snapshot.backlog == 0);
            let expected = stock - backlog + i64::from(snapshot.arrivals)
                - i64::from(snapshot.demand);
            let actual = i64::from(snapshot.stock) - i64::from(snapshot.backlog);
            assert_eq!(actual, expected, "{actor} week {}", snapshot.week);
            stock = i64::from(snapshot.stock);
            backlog = i64::from(snapshot.backlog);
        }
    }
    for summary in orchestrator.history() {
        assert!(summary.actors.iter().all(|(_, a)| a.conserved));
    }
}

#[tokio::test]
async fn transient_store_failures_are_retried() {
    let config = config(3, DemandPattern::Stable);
    let remaining = AtomicU32::new(2);
    let store = Arc::new(FlakyStore::new(&config, move |_, mutation| {
        let fail = inserts(mutation, RecordKind::Shipment)
            && remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        fail.then(|| StoreError::Unavailable {
            reason: "connection reset".to_owned(),
        })
    }));
    let mut orchestrator = orchestrator(Arc::clone(&store), &config);
    let report = orchestrator.run(&mut NoOpSink).await.unwrap();

    assert_eq!(store.injected.load(Ordering::SeqCst), 2);
    assert_eq!(report.failed_rules, 0);
    for summary in orchestrator.history() {
        assert_eq!(summary.actors.retailer.inventory, 8);
        assert_eq!(summary.actors.wholesaler.shipments_created, 4);
    }
}

#[tokio::test]
async fn permanent_failure_is_isolated_to_one_actor() {
    let config = config(1, DemandPattern::Stable);
    let blocked = PartitionRegistry::with_prefix(&config.partitions.prefix)
        .partition(Actor::Wholesaler)
        .clone();
    let store = Arc::new(FlakyStore::new(&config, move |partition, mutation| {
        (partition == &blocked && replaces(mutation, RecordKind::Metrics)).then(|| {
            StoreError::MissingRecord {
                what: "metrics index".to_owned(),
            }
        })
    }));
    let mut orchestrator = orchestrator(store, &config);
    let summary = orchestrator.run_week(1).await.unwrap();

    assert!(summary.failed >= 2);
    for failure in &summary.failures {
        assert_eq!(failure.actor, Actor::Wholesaler);
        assert_eq!(failure.attempts, 1);
    }
    assert!(
        summary
            .failures
            .iter()
            .any(|f| f.rule == RuleKind::InventoryCoverage)
    );
    assert_eq!(summary.actors.wholesaler.orders_placed, 0);
    for actor in [Actor::Retailer, Actor::Distributor, Actor::Factory] {
        assert_eq!(summary.actors.get(actor).suggested_order, 4);
        assert_eq!(summary.actors.get(actor).orders_placed, 4);
    }
}

#[tokio::test]
async fn exhausted_retries_are_counted_as_failures() {
    let mut config = config(1, DemandPattern::Stable);
    config.pipeline.max_attempts = 3;
    let store = Arc::new(FlakyStore::new(&config, |_, mutation| {
        inserts(mutation, RecordKind::CostTotal).then(|| StoreError::Timeout { millis: 10 })
    }));
    let mut orchestrator = orchestrator(Arc::clone(&store), &config);
    let summary = orchestrator.run_week(1).await.unwrap();

    assert_eq!(summary.failed, 4);
    assert!(summary.failures.iter().all(|f| f.rule == RuleKind::TotalCostCalculation));
    assert!(summary.failures.iter().all(|f| f.attempts == 3));
    assert_eq!(store.injected.load(Ordering::SeqCst), 12);
    assert_eq!(summary.actors.retailer.inventory, 8);
}

#[tokio::test]
async fn policy_failure_falls_back_to_ordering_nothing() {
    let config = config(2, DemandPattern::Stable);
    let store = memory_store(&config);
    let mut orchestrator =
        WeekOrchestrator::from_config(store, &config, Arc::new(BrokenPolicy)).unwrap();
    let mut sink = CollectingSink::default();
    orchestrator.run(&mut sink).await.unwrap();

    for summary in &sink.summaries {
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.decisions.len(), 4);
        for decision in &summary.decisions {
            assert!(decision.fallback);
            assert_eq!(decision.quantity, 0);
            assert!(decision.rationale.starts_with("policy error"));
            assert_eq!(decision.policy, "broken");
        }
        for (_, position) in summary.actors.iter() {
            assert_eq!(position.suggested_order, 0);
            assert_eq!(position.orders_placed, 0);
        }
    }
}
