//! Simulation binary for the Beerflow supply chain.
//!
//! Loads configuration, wires the in-memory store, decision policy and
//! week orchestrator together, and runs the configured number of weeks.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `beerflow-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the partition registry and the in-memory store
//! 4. Select the decision policy
//! 5. Run the week orchestrator
//! 6. Log the simulation report

mod error;
mod log_sink;

use std::path::Path;
use std::sync::Arc;

use beerflow_core::config::{LogFormat, LoggingConfig, SimulationConfig};
use beerflow_core::orchestrator::WeekOrchestrator;
use beerflow_core::policy::{DecisionPolicy, OrderUpToPolicy};
use beerflow_store::{InMemoryStore, PartitionRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::log_sink::LogSink;

/// Path of the optional configuration file.
const CONFIG_PATH: &str = "beerflow-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging setup, or the simulation
/// fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(from_file, path = CONFIG_PATH, "beerflow-engine starting");
    info!(
        weeks = config.simulation.weeks,
        seed = config.simulation.seed,
        pattern = config.demand.pattern.as_str(),
        policy = ?config.policy.kind,
        stockout_horizon = ?config.pipeline.stockout_horizon,
        "Configuration loaded"
    );

    // 3. Store and partitions.
    let registry = PartitionRegistry::with_prefix(&config.partitions.prefix);
    for (actor, partition) in registry.partitions() {
        info!(actor = %actor, partition = %partition, "Partition registered");
    }
    let store = Arc::new(InMemoryStore::new(registry));

    // 4. Decision policy.
    let policy: Arc<dyn DecisionPolicy> = Arc::new(OrderUpToPolicy::from_config(&config));

    // 5. Run.
    let mut orchestrator = WeekOrchestrator::from_config(store, &config, policy)
        .map_err(EngineError::from)?;
    let mut sink = LogSink::default();
    let report = orchestrator
        .run(&mut sink)
        .await
        .map_err(EngineError::from)?;

    // 6. Report.
    report.log();
    info!(weeks_emitted = sink.weeks(), "beerflow-engine finished");
    Ok(())
}

/// Load `beerflow-config.yaml` if it exists, otherwise defaults with
/// environment overrides.
fn load_config() -> Result<(SimulationConfig, bool), EngineError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, true))
    } else {
        Ok((SimulationConfig::parse("")?, false))
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = match logging.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}
