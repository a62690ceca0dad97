//! Decision policy interface and the built-in order-up-to policy.
//!
//! A [`DecisionPolicy`] turns an [`Observation`] into an order quantity
//! with a rationale. The pipeline never calls a policy directly: it goes
//! through [`consult`], which runs the policy off the async runtime under a
//! deadline and substitutes quantity 0 if the policy fails, times out, or
//! panics. Every consultation yields a [`DecisionRecord`] for the audit
//! trail.

use std::sync::Arc;
use std::time::Duration;

use beerflow_types::{Decision, DecisionId, DecisionRecord, Observation, PerActor};
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{PolicyKind, SimulationConfig};
use crate::transitions::order_up_to;

/// Errors a policy can report instead of a decision.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The observation cannot be decided on.
    #[error("malformed observation: {reason}")]
    MalformedObservation {
        /// What is wrong with the observation.
        reason: String,
    },

    /// The policy produced an answer the caller cannot use.
    #[error("malformed response: {reason}")]
    MalformedResponse {
        /// What is wrong with the response.
        reason: String,
    },

    /// The policy backend could not be reached.
    #[error("policy unavailable: {reason}")]
    Unavailable {
        /// Backend-specific description.
        reason: String,
    },
}

/// A strategy that chooses how much an actor orders each week.
///
/// Built-in policies are deterministic. External ones may not be; their
/// rationale is what makes a decision auditable.
pub trait DecisionPolicy: Send + Sync {
    /// Short name recorded on every decision.
    fn name(&self) -> &str;

    /// Choose an order quantity for `observation`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when no usable decision can be made; the
    /// caller then falls back to ordering nothing.
    fn decide(&self, observation: &Observation) -> Result<Decision, PolicyError>;
}

/// Orders up to a target number of weeks of smoothed demand.
///
/// `order = ceil(max(demand_rate * target_coverage - stock + backlog, 0))`
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpToPolicy {
    name: String,
    targets: PerActor<f64>,
}

impl OrderUpToPolicy {
    /// Conservative preset: four weeks of coverage.
    pub const CONSERVATIVE_COVERAGE: f64 = 4.0;

    /// Aggressive preset: two weeks of coverage.
    pub const AGGRESSIVE_COVERAGE: f64 = 2.0;

    /// Per-actor target coverage.
    pub fn new(targets: PerActor<f64>) -> Self {
        Self {
            name: "order_up_to".to_owned(),
            targets,
        }
    }

    /// One target coverage for every actor.
    pub fn uniform(name: impl Into<String>, target_coverage: f64) -> Self {
        Self {
            name: name.into(),
            targets: PerActor::from_fn(|_| target_coverage),
        }
    }

    /// Preset targeting four weeks of coverage.
    pub fn conservative() -> Self {
        Self::uniform("conservative", Self::CONSERVATIVE_COVERAGE)
    }

    /// Preset targeting two weeks of coverage.
    pub fn aggressive() -> Self {
        Self::uniform("aggressive", Self::AGGRESSIVE_COVERAGE)
    }

    /// The policy selected by `policy.kind`.
    pub fn from_config(config: &SimulationConfig) -> Self {
        match config.policy.kind {
            PolicyKind::OrderUpTo => Self::new(config.actors.map(|_, a| a.target_coverage)),
            PolicyKind::Conservative => Self::conservative(),
            PolicyKind::Aggressive => Self::aggressive(),
        }
    }
}

impl DecisionPolicy for OrderUpToPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&self, observation: &Observation) -> Result<Decision, PolicyError> {
        let current = &observation.current;
        if !current.demand_rate.is_finite() || current.demand_rate < 0.0 {
            return Err(PolicyError::MalformedObservation {
                reason: format!("demand rate {} is not a non-negative number", current.demand_rate),
            });
        }

        let coverage = *self.targets.get(observation.actor);
        let result = order_up_to(current.demand_rate, coverage, current.inventory, current.backlog);
        let rationale = format!(
            "target = {:.2} x {coverage} = {:.2}; order = ceil(max({:.2} - {} + {}, 0)) = {}",
            current.demand_rate,
            result.target,
            result.target,
            current.inventory,
            current.backlog,
            result.quantity,
        );
        Ok(Decision {
            quantity: result.quantity,
            rationale,
        })
    }
}

/// Consult `policy` for `observation`, never failing.
///
/// The policy runs on the blocking pool under `timeout`. Errors, timeouts
/// and panics become a fallback record with quantity 0.
pub async fn consult(
    policy: Arc<dyn DecisionPolicy>,
    observation: Observation,
    timeout: Duration,
) -> DecisionRecord {
    let week = observation.week;
    let actor = observation.actor;
    let name = policy.name().to_owned();

    let handle = tokio::task::spawn_blocking(move || policy.decide(&observation));
    let outcome = match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(decision))) => Ok(decision),
        Ok(Ok(Err(err))) => Err(err.to_string()),
        Ok(Err(join_err)) => Err(format!("policy task failed: {join_err}")),
        Err(_elapsed) => Err(format!("timed out after {} ms", timeout.as_millis())),
    };

    match outcome {
        Ok(decision) => {
            info!(
                week,
                actor = %actor,
                policy = %name,
                quantity = decision.quantity,
                rationale = %decision.rationale,
                "Policy decision"
            );
            DecisionRecord {
                id: DecisionId::new(),
                week,
                actor,
                policy: name,
                quantity: decision.quantity,
                rationale: decision.rationale,
                fallback: false,
                decided_at: Utc::now(),
            }
        }
        Err(detail) => {
            let rationale = format!("policy error: {detail}");
            warn!(
                week,
                actor = %actor,
                policy = %name,
                rationale = %rationale,
                "Policy failed, ordering nothing"
            );
            DecisionRecord {
                id: DecisionId::new(),
                week,
                actor,
                policy: name,
                quantity: 0,
                rationale,
                fallback: true,
                decided_at: Utc::now(),
            }
        }
    }
}
