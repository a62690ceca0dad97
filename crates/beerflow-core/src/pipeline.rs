//! The weekly rule pipeline.
//!
//! One call to [`RulePipeline::run_week`] applies the nine rules to every
//! actor in three phases separated by barriers:
//!
//! 1. **Local phase** (actors in parallel): read inbound demand and
//!    arrivals through the federated view, then rules 1 to 6 against the
//!    actor's own partition.
//! 2. **Shipping phase** (actors in parallel): rule 7 reads the orders
//!    placed this week through the federated view and ships them.
//! 3. **Closing phase** (actors in parallel): rules 8 and 9.
//!
//! Each rule application for one actor is the unit of retry. Transient
//! failures are retried up to `max_attempts` times; a rule that still
//! fails is recorded in the [`PipelineReport`] and the week carries on.
//! Rules are idempotent, so running a settled week again only skips.

use core::future::Future;
use std::sync::Arc;
use std::time::Duration;

use beerflow_store::{PartitionRegistry, StoreError, TemporalStore};
use beerflow_types::{Actor, DecisionRecord, RuleKind};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{SimulationConfig, StockoutHorizon};
use crate::policy::DecisionPolicy;
use crate::reader::StoreReader;
use crate::topology::Topology;

/// Errors from a single rule application.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The store call failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// A record the rule needs was never created.
    #[error("missing prerequisite: {what}")]
    MissingPrerequisite {
        /// Description of the missing record.
        what: String,
    },

    /// The record changed between read and write.
    #[error("concurrent write to {what}")]
    ConcurrentWrite {
        /// Description of the contended record.
        what: String,
    },
}

impl PipelineError {
    /// Whether applying the rule again may succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Store { source } => source.is_transient(),
            Self::MissingPrerequisite { .. } => false,
            Self::ConcurrentWrite { .. } => true,
        }
    }
}

/// What a successful rule application did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleOutcome {
    /// The rule wrote its effect.
    Executed,
    /// The effect was already present; nothing was written.
    Skipped,
}

/// A rule application that failed after all attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    /// Week the rule ran for.
    pub week: u32,
    /// The failing rule.
    pub rule: RuleKind,
    /// The actor it ran for.
    pub actor: Actor,
    /// Attempts made.
    pub attempts: u32,
    /// Last error.
    pub error: String,
}

/// Tally of one week's rule applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Week the pipeline ran for.
    pub week: u32,
    /// Rule applications that wrote an effect.
    pub executed: u32,
    /// Rule applications that found nothing to do.
    pub skipped: u32,
    /// Rule applications that failed.
    pub failed: u32,
    /// Details of every failure.
    pub failures: Vec<RuleFailure>,
    /// Policy consultations made this run.
    pub decisions: Vec<DecisionRecord>,
}

impl PipelineReport {
    fn new(week: u32) -> Self {
        Self {
            week,
            ..Self::default()
        }
    }

    fn record(&mut self, result: Result<RuleOutcome, RuleFailure>) {
        match result {
            Ok(RuleOutcome::Executed) => self.executed = self.executed.saturating_add(1),
            Ok(RuleOutcome::Skipped) => self.skipped = self.skipped.saturating_add(1),
            Err(failure) => {
                self.failed = self.failed.saturating_add(1);
                self.failures.push(failure);
            }
        }
    }

    fn merge(&mut self, other: Self) {
        self.executed = self.executed.saturating_add(other.executed);
        self.skipped = self.skipped.saturating_add(other.skipped);
        self.failed = self.failed.saturating_add(other.failed);
        self.failures.extend(other.failures);
        self.decisions.extend(other.decisions);
    }

    /// Total rule applications attempted.
    pub const fn total(&self) -> u32 {
        self.executed
            .saturating_add(self.skipped)
            .saturating_add(self.failed)
    }
}

/// Execution limits and rule parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Deadline for one attempt of one rule application.
    pub store_timeout: Duration,
    /// Attempts before a rule application is marked failed.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
    /// Horizon for stockout detection.
    pub stockout_horizon: StockoutHorizon,
    /// Deadline for one policy consultation.
    pub policy_timeout: Duration,
    /// Past weeks shown to the policy.
    pub history_weeks: u32,
    /// Demand rate assumed when no earlier rate exists.
    pub initial_demand_rate: f64,
}

impl PipelineSettings {
    /// Settings taken from the `pipeline`, `policy` and `initial` sections.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            store_timeout: Duration::from_millis(config.pipeline.store_timeout_ms),
            max_attempts: config.pipeline.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.pipeline.retry_backoff_ms),
            stockout_horizon: config.pipeline.stockout_horizon,
            policy_timeout: Duration::from_millis(config.policy.timeout_ms),
            history_weeks: config.policy.history_weeks,
            initial_demand_rate: config.initial.demand_rate,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

/// Applies the nine rules for one week over a [`TemporalStore`].
pub struct RulePipeline<S> {
    pub(crate) store: Arc<S>,
    pub(crate) registry: PartitionRegistry,
    pub(crate) topology: Topology,
    pub(crate) policy: Arc<dyn DecisionPolicy>,
    pub(crate) settings: PipelineSettings,
}

impl<S: TemporalStore> RulePipeline<S> {
    /// Assemble a pipeline.
    pub fn new(
        store: Arc<S>,
        registry: PartitionRegistry,
        topology: Topology,
        policy: Arc<dyn DecisionPolicy>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            registry,
            topology,
            policy,
            settings,
        }
    }

    /// The supply-chain topology the rules use.
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The partition registry the rules write through.
    pub const fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    /// The execution settings.
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub(crate) fn reader(&self) -> StoreReader<'_, S> {
        StoreReader::new(&self.store, &self.registry)
    }

    /// Apply every rule for every actor in `week`.
    ///
    /// Never fails as a whole; failures are counted in the report.
    pub async fn run_week(&self, week: u32) -> PipelineReport {
        let mut report = PipelineReport::new(week);

        for partial in join_all(Actor::ALL.map(|actor| self.local_phase(actor, week))).await {
            report.merge(partial);
        }

        let shipping = join_all(Actor::ALL.map(|actor| {
            self.apply(RuleKind::CreateShipments, actor, week, move || {
                self.create_shipments(actor, week)
            })
        }))
        .await;
        for result in shipping {
            report.record(result);
        }

        for partial in join_all(Actor::ALL.map(|actor| self.closing_phase(actor, week))).await {
            report.merge(partial);
        }

        info!(
            week,
            executed = report.executed,
            skipped = report.skipped,
            failed = report.failed,
            "Rules applied"
        );
        report
    }

    /// Rules 1 to 6 for one actor, after the inbound federated read.
    async fn local_phase(&self, actor: Actor, week: u32) -> PipelineReport {
        let mut report = PipelineReport::new(week);

        let inbound = self
            .apply(RuleKind::InventoryUpdate, actor, week, move || {
                self.read_inbound(actor, week)
            })
            .await;

        let smoothing = match &inbound {
            Ok(flows) => {
                let observed = flows.demand;
                self.apply(RuleKind::DemandRateSmoothing, actor, week, move || {
                    self.smooth_demand(actor, week, observed)
                })
                .await
            }
            Err(failure) => Err(RuleFailure {
                rule: RuleKind::DemandRateSmoothing,
                ..failure.clone()
            }),
        };
        report.record(smoothing);

        let settlement = match &inbound {
            Ok(flows) => {
                let arrivals = flows.arrivals;
                let demand = flows.demand.unwrap_or(0);
                self.apply(RuleKind::InventoryUpdate, actor, week, move || {
                    self.update_inventory(actor, week, arrivals, demand)
                })
                .await
            }
            Err(failure) => Err(failure.clone()),
        };
        report.record(settlement);

        report.record(
            self.apply(RuleKind::InventoryCoverage, actor, week, move || {
                self.compute_coverage(actor, week)
            })
            .await,
        );
        report.record(
            self.apply(RuleKind::StockoutRiskDetection, actor, week, move || {
                self.detect_stockout(actor, week)
            })
            .await,
        );

        let in_transit = inbound.as_ref().map_or(0, |flows| flows.in_transit);
        match self
            .apply(RuleKind::OrderUpToPolicy, actor, week, move || {
                self.derive_order(actor, week, in_transit)
            })
            .await
        {
            Ok(Some(decision)) => {
                report.record(Ok(RuleOutcome::Executed));
                report.decisions.push(decision);
            }
            Ok(None) => report.record(Ok(RuleOutcome::Skipped)),
            Err(failure) => report.record(Err(failure)),
        }

        report.record(
            self.apply(RuleKind::CreateOrders, actor, week, move || {
                self.create_order(actor, week)
            })
            .await,
        );

        report
    }

    /// Rules 8 and 9 for one actor.
    async fn closing_phase(&self, actor: Actor, week: u32) -> PipelineReport {
        let mut report = PipelineReport::new(week);
        report.record(
            self.apply(RuleKind::BullwhipDetection, actor, week, move || {
                self.detect_bullwhip(actor, week)
            })
            .await,
        );
        report.record(
            self.apply(RuleKind::TotalCostCalculation, actor, week, move || {
                self.accrue_cost(actor, week)
            })
            .await,
        );
        report
    }

    /// Run `op` with the store deadline, retrying transient failures.
    async fn apply<T, F, Fut>(
        &self,
        rule: RuleKind,
        actor: Actor,
        week: u32,
        mut op: F,
    ) -> Result<T, RuleFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let deadline = self.settings.store_timeout;
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let result = match tokio::time::timeout(deadline, op()).await {
                Ok(result) => result,
                Err(_elapsed) => Err(PipelineError::Store {
                    source: StoreError::Timeout {
                        millis: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                    },
                }),
            };

            match result {
                Ok(value) => {
                    debug!(week, actor = %actor, rule = %rule, attempt, "Rule applied");
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.settings.max_attempts => {
                    warn!(
                        week,
                        actor = %actor,
                        rule = %rule,
                        attempt,
                        error = %err,
                        "Rule failed, retrying"
                    );
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
                Err(err) => {
                    warn!(
                        week,
                        actor = %actor,
                        rule = %rule,
                        attempt,
                        error = %err,
                        "Rule failed"
                    );
                    return Err(RuleFailure {
                        week,
                        rule,
                        actor,
                        attempts: attempt,
                        error: err.to_string(),
                    });
                }
            }
        }
    }
}
