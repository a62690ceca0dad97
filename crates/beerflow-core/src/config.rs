//! Configuration loading and typed config structures for the Beerflow
//! simulation.
//!
//! The canonical configuration lives in `beerflow-config.yaml` at the
//! project root. Every field has a default, so an empty file (or no file at
//! all) describes the classic game: four actors, stable demand of 4 units,
//! 12 units of opening stock, two-week lead times.
//!
//! Loading runs in three steps: parse the YAML, apply environment
//! overrides, validate.

use std::path::Path;

use beerflow_types::{Actor, ActorProfile, DemandPattern, PerActor};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::topology::Topology;

/// Environment variable overriding `simulation.weeks`.
pub const ENV_WEEKS: &str = "BEERFLOW_WEEKS";
/// Environment variable overriding `demand.pattern`.
pub const ENV_DEMAND_PATTERN: &str = "BEERFLOW_DEMAND_PATTERN";
/// Environment variable overriding `simulation.seed`.
pub const ENV_SEED: &str = "BEERFLOW_SEED";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {variable}: {reason}")]
    EnvOverride {
        /// The environment variable.
        variable: &'static str,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A value is outside its permitted range.
    #[error("invalid config {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The supply-chain topology is malformed.
    #[error("invalid topology: {reason}")]
    Topology {
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `beerflow-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Run length and seed.
    #[serde(default)]
    pub simulation: RunConfig,

    /// Customer demand pattern.
    #[serde(default)]
    pub demand: DemandConfig,

    /// Opening position of every actor.
    #[serde(default)]
    pub initial: InitialConfig,

    /// Per-actor static parameters.
    #[serde(default)]
    pub actors: PerActor<ActorConfig>,

    /// Decision policy selection.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Rule execution limits.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Store partition naming.
    #[serde(default)]
    pub partitions: PartitionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `BEERFLOW_WEEKS` overrides `simulation.weeks`
    /// - `BEERFLOW_DEMAND_PATTERN` overrides `demand.pattern`
    /// - `BEERFLOW_SEED` overrides `simulation.seed`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, and a
    /// validation error if the resulting configuration is unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying environment
    /// overrides and validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or a
    /// validation error.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse_with_env(yaml, |key| std::env::var(key).ok())
    }

    /// Like [`SimulationConfig::parse`], reading overrides through `lookup`
    /// instead of the process environment.
    ///
    /// # Errors
    ///
    /// See [`SimulationConfig::parse`].
    pub fn parse_with_env(
        yaml: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Override selected values with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvOverride`] if a set variable cannot be
    /// parsed.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_WEEKS) {
            self.simulation.weeks =
                value
                    .trim()
                    .parse()
                    .map_err(|err: core::num::ParseIntError| ConfigError::EnvOverride {
                        variable: ENV_WEEKS,
                        reason: err.to_string(),
                        value: value.clone(),
                    })?;
        }
        if let Some(value) = lookup(ENV_DEMAND_PATTERN) {
            self.demand.pattern =
                DemandPattern::parse(&value).ok_or_else(|| ConfigError::EnvOverride {
                    variable: ENV_DEMAND_PATTERN,
                    reason: "unknown demand pattern".to_owned(),
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup(ENV_SEED) {
            self.simulation.seed =
                value
                    .trim()
                    .parse()
                    .map_err(|err: core::num::ParseIntError| ConfigError::EnvOverride {
                        variable: ENV_SEED,
                        reason: err.to_string(),
                        value: value.clone(),
                    })?;
        }
        Ok(())
    }

    /// Check ranges and the supply-chain topology.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] or [`ConfigError::Topology`] for
    /// the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.weeks == 0 {
            return Err(invalid("simulation.weeks", "must be at least 1"));
        }
        if self.demand.random_min > self.demand.random_max {
            return Err(invalid(
                "demand.random_min",
                format!(
                    "{} exceeds random_max {}",
                    self.demand.random_min, self.demand.random_max
                ),
            ));
        }
        if !self.initial.demand_rate.is_finite() || self.initial.demand_rate < 0.0 {
            return Err(invalid("initial.demand_rate", "must be a non-negative number"));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(invalid("pipeline.max_attempts", "must be at least 1"));
        }
        if self.partitions.prefix.trim().is_empty() {
            return Err(invalid("partitions.prefix", "must not be empty"));
        }
        for (actor, cfg) in self.actors.iter() {
            let field = |name: &str| format!("actors.{}.{name}", actor.as_str());
            if cfg.lead_time == 0 {
                return Err(invalid(field("lead_time"), "must be at least 1"));
            }
            if cfg.holding_cost.is_sign_negative() {
                return Err(invalid(field("holding_cost"), "must not be negative"));
            }
            if cfg.backlog_cost.is_sign_negative() {
                return Err(invalid(field("backlog_cost"), "must not be negative"));
            }
            if !cfg.target_coverage.is_finite() || cfg.target_coverage < 0.0 {
                return Err(invalid(field("target_coverage"), "must be a non-negative number"));
            }
        }
        Topology::new(self.profiles()).map(|_| ())
    }

    /// Resolve the static profile of every actor.
    ///
    /// An unset `upstream` falls back to the classic chain; an actor naming
    /// itself as upstream is a source tier.
    pub fn profiles(&self) -> PerActor<ActorProfile> {
        self.actors.map(|actor, cfg| ActorProfile {
            actor,
            lead_time: cfg.lead_time,
            order_delay: cfg.order_delay,
            holding_cost: cfg.holding_cost,
            backlog_cost: cfg.backlog_cost,
            target_coverage: cfg.target_coverage,
            upstream: match cfg.upstream {
                Some(up) if up == actor => None,
                Some(up) => Some(up),
                None => actor.default_upstream(),
            },
        })
    }
}

/// Run length and randomness.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Number of weeks to simulate.
    #[serde(default = "default_weeks")]
    pub weeks: u32,

    /// Seed for the bounded-random demand pattern.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            weeks: default_weeks(),
            seed: default_seed(),
        }
    }
}

/// Exogenous customer demand.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DemandConfig {
    /// Which pattern to generate.
    #[serde(default)]
    pub pattern: DemandPattern,

    /// Baseline weekly demand.
    #[serde(default = "default_base_demand")]
    pub base: u32,

    /// Week in which the spike pattern peaks.
    #[serde(default = "default_spike_week")]
    pub spike_week: u32,

    /// Demand during the spike week.
    #[serde(default = "default_spike")]
    pub spike: u32,

    /// Weekly increment of the increasing pattern.
    #[serde(default = "default_step")]
    pub step: u32,

    /// Lower bound of the random pattern (inclusive).
    #[serde(default = "default_random_min")]
    pub random_min: u32,

    /// Upper bound of the random pattern (inclusive).
    #[serde(default = "default_random_max")]
    pub random_max: u32,

    /// Even-week demand of the alternating pattern.
    #[serde(default = "default_alternate_high")]
    pub alternate_high: u32,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            pattern: DemandPattern::default(),
            base: default_base_demand(),
            spike_week: default_spike_week(),
            spike: default_spike(),
            step: default_step(),
            random_min: default_random_min(),
            random_max: default_random_max(),
            alternate_high: default_alternate_high(),
        }
    }
}

/// Opening position shared by every actor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InitialConfig {
    /// Units on hand at the start of week 1.
    #[serde(default = "default_initial_stock")]
    pub stock: u32,

    /// Units owed at the start of week 1.
    #[serde(default)]
    pub backlog: u32,

    /// Demand rate assumed before any demand is observed.
    #[serde(default = "default_initial_demand_rate")]
    pub demand_rate: f64,

    /// Units already in transit and on order at week 0.
    #[serde(default = "default_initial_pipeline")]
    pub pipeline: u32,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            stock: default_initial_stock(),
            backlog: 0,
            demand_rate: default_initial_demand_rate(),
            pipeline: default_initial_pipeline(),
        }
    }
}

/// Static parameters of one actor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActorConfig {
    /// Shipping lead time in weeks.
    #[serde(default = "default_lead_time")]
    pub lead_time: u32,

    /// Order review delay in weeks.
    #[serde(default = "default_order_delay")]
    pub order_delay: u32,

    /// Holding cost per unit per week.
    #[serde(default = "default_holding_cost")]
    pub holding_cost: Decimal,

    /// Backlog cost per unit per week.
    #[serde(default = "default_backlog_cost")]
    pub backlog_cost: Decimal,

    /// Weeks of demand the order-up-to policy targets.
    #[serde(default = "default_target_coverage")]
    pub target_coverage: f64,

    /// Supplier override. Unset keeps the classic chain; naming the actor
    /// itself makes it a source tier.
    #[serde(default)]
    pub upstream: Option<Actor>,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            lead_time: default_lead_time(),
            order_delay: default_order_delay(),
            holding_cost: default_holding_cost(),
            backlog_cost: default_backlog_cost(),
            target_coverage: default_target_coverage(),
            upstream: None,
        }
    }
}

/// Which built-in decision policy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Order up to each actor's configured target coverage.
    #[default]
    OrderUpTo,
    /// Order up to four weeks of coverage.
    Conservative,
    /// Order up to two weeks of coverage.
    Aggressive,
}

/// Decision policy settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyConfig {
    /// Policy variant.
    #[serde(default)]
    pub kind: PolicyKind,

    /// Deadline for one consultation.
    #[serde(default = "default_policy_timeout_ms")]
    pub timeout_ms: u64,

    /// Past weeks included in each observation.
    #[serde(default = "default_history_weeks")]
    pub history_weeks: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::default(),
            timeout_ms: default_policy_timeout_ms(),
            history_weeks: default_history_weeks(),
        }
    }
}

/// Horizon the stockout rule compares coverage against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockoutHorizon {
    /// Shipping lead time only.
    #[default]
    LeadTime,
    /// Shipping lead time plus order review delay.
    LeadTimePlusOrderDelay,
}

impl StockoutHorizon {
    /// Horizon in weeks for `profile`.
    pub const fn weeks(self, profile: &ActorProfile) -> u32 {
        match self {
            Self::LeadTime => profile.lead_time,
            Self::LeadTimePlusOrderDelay => profile.lead_time.saturating_add(profile.order_delay),
        }
    }
}

/// Rule execution limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Deadline for the store calls of one rule application.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Attempts per rule application before it is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Stockout comparison horizon.
    #[serde(default)]
    pub stockout_horizon: StockoutHorizon,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            stockout_horizon: StockoutHorizon::default(),
        }
    }
}

/// Store partition naming.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartitionConfig {
    /// Prefix of every partition name.
    #[serde(default = "default_partition_prefix")]
    pub prefix: String,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            prefix: default_partition_prefix(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_weeks() -> u32 {
    6
}

const fn default_seed() -> u64 {
    42
}

const fn default_base_demand() -> u32 {
    4
}

const fn default_spike_week() -> u32 {
    3
}

const fn default_spike() -> u32 {
    12
}

const fn default_step() -> u32 {
    1
}

const fn default_random_min() -> u32 {
    2
}

const fn default_random_max() -> u32 {
    8
}

const fn default_alternate_high() -> u32 {
    8
}

const fn default_initial_stock() -> u32 {
    12
}

const fn default_initial_demand_rate() -> f64 {
    4.0
}

const fn default_initial_pipeline() -> u32 {
    4
}

const fn default_lead_time() -> u32 {
    2
}

const fn default_order_delay() -> u32 {
    1
}

fn default_holding_cost() -> Decimal {
    Decimal::new(5, 1)
}

const fn default_backlog_cost() -> Decimal {
    Decimal::ONE
}

const fn default_target_coverage() -> f64 {
    3.0
}

const fn default_policy_timeout_ms() -> u64 {
    5_000
}

const fn default_history_weeks() -> u32 {
    5
}

const fn default_store_timeout_ms() -> u64 {
    30_000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_partition_prefix() -> String {
    "bg".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.weeks, 6);
        assert_eq!(config.demand.base, 4);
        assert_eq!(config.initial.stock, 12);
        assert_eq!(config.actors.retailer.lead_time, 2);
        assert_eq!(config.actors.factory.holding_cost, Decimal::new(5, 1));
        assert_eq!(config.pipeline.stockout_horizon, StockoutHorizon::LeadTime);
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = SimulationConfig::parse_with_env("", no_env).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
simulation:
  weeks: 20
  seed: 7

demand:
  pattern: spike
  base: 5
  spike_week: 4
  spike: 15

initial:
  stock: 10
  demand_rate: 5.0

actors:
  retailer:
    lead_time: 1
    holding_cost: 0.25
  factory:
    lead_time: 3
    target_coverage: 4.5

policy:
  kind: conservative
  timeout_ms: 1000

pipeline:
  max_attempts: 5
  stockout_horizon: lead_time_plus_order_delay

partitions:
  prefix: "run1"

logging:
  level: "debug"
  format: json
"#;

        let config = SimulationConfig::parse_with_env(yaml, no_env).unwrap();
        assert_eq!(config.simulation.weeks, 20);
        assert_eq!(config.demand.pattern, DemandPattern::Spike);
        assert_eq!(config.demand.spike, 15);
        assert_eq!(config.demand.step, 1);
        assert_eq!(config.initial.stock, 10);
        assert_eq!(config.actors.retailer.lead_time, 1);
        assert_eq!(config.actors.retailer.holding_cost, Decimal::new(25, 2));
        assert_eq!(config.actors.wholesaler.lead_time, 2);
        assert_eq!(config.actors.factory.lead_time, 3);
        assert_eq!(config.policy.kind, PolicyKind::Conservative);
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(
            config.pipeline.stockout_horizon,
            StockoutHorizon::LeadTimePlusOrderDelay
        );
        assert_eq!(config.partitions.prefix, "run1");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn env_overrides_apply() {
        let env = |key: &str| match key {
            ENV_WEEKS => Some("12".to_owned()),
            ENV_DEMAND_PATTERN => Some("random".to_owned()),
            ENV_SEED => Some("99".to_owned()),
            _ => None,
        };
        let config = SimulationConfig::parse_with_env("simulation:\n  weeks: 3\n", env).unwrap();
        assert_eq!(config.simulation.weeks, 12);
        assert_eq!(config.simulation.seed, 99);
        assert_eq!(config.demand.pattern, DemandPattern::Random);
    }

    #[test]
    fn bad_env_override_is_reported() {
        let env = |key: &str| (key == ENV_DEMAND_PATTERN).then(|| "seasonal".to_owned());
        let err = SimulationConfig::parse_with_env("", env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EnvOverride {
                variable: ENV_DEMAND_PATTERN,
                ..
            }
        ));
    }

    #[test]
    fn zero_weeks_rejected() {
        let err = SimulationConfig::parse_with_env("simulation:\n  weeks: 0\n", no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field, .. } if field == "simulation.weeks"));
    }

    #[test]
    fn inverted_random_bounds_rejected() {
        let yaml = "demand:\n  random_min: 9\n  random_max: 3\n";
        assert!(SimulationConfig::parse_with_env(yaml, no_env).is_err());
    }

    #[test]
    fn zero_lead_time_rejected() {
        let yaml = "actors:\n  distributor:\n    lead_time: 0\n";
        let err = SimulationConfig::parse_with_env(yaml, no_env).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { field, .. } if field == "actors.distributor.lead_time")
        );
    }

    #[test]
    fn negative_cost_rejected() {
        let yaml = "actors:\n  retailer:\n    backlog_cost: -1.0\n";
        assert!(SimulationConfig::parse_with_env(yaml, no_env).is_err());
    }

    #[test]
    fn cyclic_topology_rejected() {
        let yaml = "actors:\n  factory:\n    upstream: retailer\n";
        let err = SimulationConfig::parse_with_env(yaml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Topology { .. }));
    }

    #[test]
    fn self_upstream_marks_source_tier() {
        let yaml = "actors:\n  distributor:\n    upstream: distributor\n";
        let config = SimulationConfig::parse_with_env(yaml, no_env).unwrap();
        let profiles = config.profiles();
        assert_eq!(profiles.distributor.upstream, None);
        assert_eq!(profiles.wholesaler.upstream, Some(Actor::Distributor));
    }

    #[test]
    fn horizon_adds_order_delay() {
        let profile = SimulationConfig::default().profiles().retailer;
        assert_eq!(StockoutHorizon::LeadTime.weeks(&profile), 2);
        assert_eq!(StockoutHorizon::LeadTimePlusOrderDelay.weeks(&profile), 3);
    }
}
