//! Observation payload handed to decision policies, and the audit record
//! produced by every consultation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Actor, Alert};
use crate::ids::DecisionId;

/// Everything a decision policy may look at when choosing an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Week the decision is for.
    pub week: u32,
    /// Actor the decision is for.
    pub actor: Actor,
    /// Position after this week's inventory settlement.
    pub current: CurrentState,
    /// Earlier weeks, oldest first.
    pub history: Vec<HistoryEntry>,
    /// Active risk alerts.
    pub alerts: Vec<Alert>,
}

/// The actor's position in the week being decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    /// Units on hand.
    pub inventory: u32,
    /// Units owed downstream.
    pub backlog: u32,
    /// Smoothed demand per week.
    pub demand_rate: f64,
    /// Weeks of stock, `None` when demand rate is zero.
    pub coverage: Option<f64>,
    /// Units shipped to the actor that have not yet arrived.
    pub incoming_shipments: u32,
}

/// One past week as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The past week.
    pub week: u32,
    /// Units on hand after settlement.
    pub inventory: u32,
    /// Units owed after settlement.
    pub backlog: u32,
    /// Smoothed demand rate.
    pub demand_rate: f64,
    /// Order quantity placed that week.
    pub order_quantity: u32,
}

/// A policy's answer: how much to order, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Units to order.
    pub quantity: u32,
    /// Human-readable explanation kept for audit.
    pub rationale: String,
}

/// Audit entry for one policy consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Unique identifier of the consultation.
    pub id: DecisionId,
    /// Week decided.
    pub week: u32,
    /// Actor decided for.
    pub actor: Actor,
    /// Name of the policy consulted.
    pub policy: String,
    /// Quantity adopted.
    pub quantity: u32,
    /// Policy rationale, or the failure that forced the fallback.
    pub rationale: String,
    /// True when the policy failed and quantity 0 was substituted.
    pub fallback: bool,
    /// Wall-clock time of the decision.
    pub decided_at: DateTime<Utc>,
}
