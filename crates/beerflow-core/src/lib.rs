//! Weekly rule pipeline and orchestration for the Beerflow simulation.
//!
//! This crate owns the temporal rule pipeline that advances the four-tier
//! supply chain one week at a time: demand smoothing, inventory
//! settlement, coverage and risk metrics, the ordering decision, orders and
//! shipments, and cost accrual.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `beerflow-config.yaml` into
//!   strongly-typed structs.
//! - [`topology`] -- Static actor-to-supplier chain.
//! - [`demand`] -- Exogenous customer demand patterns.
//! - [`transitions`] -- Pure functions behind every rule.
//! - [`policy`] -- [`DecisionPolicy`] trait, [`OrderUpToPolicy`] and the
//!   fallback-safe [`consult`] wrapper.
//! - [`reader`] -- Typed local and federated store reads.
//! - [`pipeline`] -- The nine-rule [`RulePipeline`] with retry and timeout.
//! - [`orchestrator`] -- The [`WeekOrchestrator`] state machine.
//! - [`report`] -- End-of-run [`SimulationReport`].
//!
//! [`DecisionPolicy`]: policy::DecisionPolicy
//! [`OrderUpToPolicy`]: policy::OrderUpToPolicy
//! [`consult`]: policy::consult
//! [`RulePipeline`]: pipeline::RulePipeline
//! [`WeekOrchestrator`]: orchestrator::WeekOrchestrator
//! [`SimulationReport`]: report::SimulationReport

pub mod config;
pub mod demand;
pub mod orchestrator;
pub mod pipeline;
pub mod policy;
pub mod reader;
pub mod report;
mod rules;
pub mod topology;
pub mod transitions;
