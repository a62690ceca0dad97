//! Shared type definitions for the Beerflow supply-chain simulation.
//!
//! This crate is the single source of truth for the values that flow
//! between the store, the rule pipeline and the orchestrator.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for runs and decisions
//! - [`enums`] -- Actors, record kinds, alerts, demand patterns, rules
//! - [`per_actor`] -- Total per-actor map used for profiles and partitions
//! - [`structs`] -- Week-scoped records and static actor attributes
//! - [`observation`] -- Decision policy input and audit records

pub mod enums;
pub mod ids;
pub mod observation;
pub mod per_actor;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Actor, Alert, DemandPattern, RecordKind, RuleKind};
pub use ids::{DecisionId, SimulationId};
pub use observation::{CurrentState, Decision, DecisionRecord, HistoryEntry, Observation};
pub use per_actor::PerActor;
pub use structs::{
    ActorMetrics, ActorProfile, CostTotal, CustomerDemand, InventorySnapshot, Order, Shipment,
    Week,
};
