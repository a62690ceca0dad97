//! The nine transition rules, one method per rule.
//!
//! Every rule reads what it needs, computes the new state with a pure
//! function from [`crate::transitions`], and commits it with one
//! conditional mutation to the actor's own partition. Each rule checks its
//! idempotency guard first and reports [`RuleOutcome::Skipped`] when its
//! effect is already present.

use std::sync::Arc;

use beerflow_store::{Mutation, Record, TemporalStore, UpdateOutcome};
use beerflow_types::{
    Actor, ActorMetrics, Alert, CostTotal, CurrentState, DecisionRecord, HistoryEntry,
    InventorySnapshot, Observation, Order, Shipment,
};
use tracing::{debug, info};

use crate::pipeline::{PipelineError, RuleOutcome, RulePipeline};
use crate::policy::consult;
use crate::transitions::{
    amplification, bullwhip_risk, inventory_coverage, settle_inventory, smooth_demand_rate,
    stockout_risk, total_cost,
};

/// Cross-partition inputs gathered before the local rules run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InboundFlows {
    /// Demand to settle this week; `None` when the retailer's customer
    /// demand was never injected.
    pub demand: Option<u32>,
    /// Units arriving this week.
    pub arrivals: u32,
    /// Units still travelling towards the actor.
    pub in_transit: u32,
}

fn sum_units(quantities: impl Iterator<Item = u32>) -> u32 {
    quantities.fold(0, u32::saturating_add)
}

fn missing(what: &str, actor: Actor, week: u32) -> PipelineError {
    PipelineError::MissingPrerequisite {
        what: format!("{what} for {actor} in week {week}"),
    }
}

fn same_ratio(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.to_bits() == b.to_bits(),
        (None, None) => true,
        _ => false,
    }
}

impl<S: TemporalStore> RulePipeline<S> {
    // =========================================================================
    // Store helpers
    // =========================================================================

    async fn commit(
        &self,
        actor: Actor,
        mutation: Mutation,
        what: &str,
    ) -> Result<RuleOutcome, PipelineError> {
        match self
            .store
            .update(self.registry.partition(actor), mutation)
            .await?
        {
            UpdateOutcome::Applied => Ok(RuleOutcome::Executed),
            UpdateOutcome::ConditionFailed => Err(PipelineError::ConcurrentWrite {
                what: format!("{what} of {actor}"),
            }),
        }
    }

    /// Insert `record` unless its key is taken; an existing record is an
    /// idempotent no-op.
    async fn create_once(&self, actor: Actor, record: Record) -> Result<RuleOutcome, PipelineError> {
        match self
            .store
            .update(self.registry.partition(actor), Mutation::create(record))
            .await?
        {
            UpdateOutcome::Applied => Ok(RuleOutcome::Executed),
            UpdateOutcome::ConditionFailed => Ok(RuleOutcome::Skipped),
        }
    }

    async fn require_metrics(&self, actor: Actor, week: u32) -> Result<ActorMetrics, PipelineError> {
        self.reader()
            .metrics(actor, week)
            .await?
            .ok_or_else(|| missing("metrics", actor, week))
    }

    async fn require_inventory(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<InventorySnapshot, PipelineError> {
        self.reader()
            .inventory(actor, week)
            .await?
            .ok_or_else(|| missing("inventory snapshot", actor, week))
    }

    // =========================================================================
    // Inbound federated read
    // =========================================================================

    /// Demand, arrivals and in-transit units for `actor` in `week`.
    ///
    /// The retailer's demand is its customer demand. Every other actor
    /// settles the orders its customers placed in the previous week;
    /// production orders are not demand.
    pub(crate) async fn read_inbound(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<InboundFlows, PipelineError> {
        let reader = self.reader();
        let demand = if actor.faces_customers() {
            reader.customer_demand(week).await?
        } else {
            match week.checked_sub(1) {
                Some(previous) => {
                    let orders = reader.orders_addressed_to(actor, previous).await?;
                    Some(sum_units(
                        orders
                            .iter()
                            .filter(|o| !o.is_production())
                            .map(|o| o.quantity),
                    ))
                }
                None => Some(0),
            }
        };
        let arrivals = sum_units(
            reader
                .arrivals(actor, week)
                .await?
                .iter()
                .map(|s| s.quantity),
        );
        let in_transit = sum_units(
            reader
                .in_transit(actor, week)
                .await?
                .iter()
                .map(|s| s.quantity),
        );
        Ok(InboundFlows {
            demand,
            arrivals,
            in_transit,
        })
    }

    // =========================================================================
    // Rule 1: demand rate smoothing
    // =========================================================================

    /// Smooth against the previous week's settled rate so that applying the
    /// rule twice gives the same rate.
    pub(crate) async fn smooth_demand(
        &self,
        actor: Actor,
        week: u32,
        observed: Option<u32>,
    ) -> Result<RuleOutcome, PipelineError> {
        let Some(observed) = observed else {
            debug!(week, actor = %actor, "No observed demand, keeping rate");
            return Ok(RuleOutcome::Skipped);
        };
        let metrics = self.require_metrics(actor, week).await?;
        let previous_rate = match week.checked_sub(1) {
            Some(previous) => self.reader().metrics(actor, previous).await?.map(|m| m.demand_rate),
            None => None,
        };
        let old = previous_rate.unwrap_or(self.settings.initial_demand_rate);
        let rate = smooth_demand_rate(old, observed);
        if rate.to_bits() == metrics.demand_rate.to_bits() {
            return Ok(RuleOutcome::Skipped);
        }

        let next = ActorMetrics {
            demand_rate: rate,
            ..metrics
        };
        self.commit(
            actor,
            Mutation::replace(Record::Metrics(metrics), Record::Metrics(next)),
            "demand rate",
        )
        .await
    }

    // =========================================================================
    // Rule 2: inventory update
    // =========================================================================

    pub(crate) async fn update_inventory(
        &self,
        actor: Actor,
        week: u32,
        arrivals: u32,
        demand: u32,
    ) -> Result<RuleOutcome, PipelineError> {
        let opening = self.require_inventory(actor, week).await?;
        if opening.processed {
            return Ok(RuleOutcome::Skipped);
        }
        let settled = settle_inventory(&opening, arrivals, demand);
        debug!(
            week,
            actor = %actor,
            arrivals,
            demand,
            stock = settled.stock,
            backlog = settled.backlog,
            "Inventory settled"
        );
        self.commit(
            actor,
            Mutation::replace(Record::Inventory(opening), Record::Inventory(settled)),
            "inventory",
        )
        .await
    }

    // =========================================================================
    // Rule 3: inventory coverage
    // =========================================================================

    pub(crate) async fn compute_coverage(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<RuleOutcome, PipelineError> {
        let metrics = self.require_metrics(actor, week).await?;
        if metrics.coverage_calculated {
            return Ok(RuleOutcome::Skipped);
        }
        let snapshot = self.require_inventory(actor, week).await?;
        let next = ActorMetrics {
            inventory_coverage: inventory_coverage(snapshot.stock, metrics.demand_rate),
            coverage_calculated: true,
            ..metrics
        };
        self.commit(
            actor,
            Mutation::replace(Record::Metrics(metrics), Record::Metrics(next)),
            "coverage",
        )
        .await
    }

    // =========================================================================
    // Rule 4: stockout risk
    // =========================================================================

    pub(crate) async fn detect_stockout(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<RuleOutcome, PipelineError> {
        let metrics = self.require_metrics(actor, week).await?;
        let horizon = self
            .settings
            .stockout_horizon
            .weeks(self.topology.profile(actor));
        let risk = stockout_risk(metrics.inventory_coverage, horizon);
        if risk == metrics.stockout_risk {
            return Ok(RuleOutcome::Skipped);
        }
        if risk {
            info!(week, actor = %actor, horizon, "Stockout risk");
        }
        let next = ActorMetrics {
            stockout_risk: risk,
            ..metrics
        };
        self.commit(
            actor,
            Mutation::replace(Record::Metrics(metrics), Record::Metrics(next)),
            "stockout flag",
        )
        .await
    }

    // =========================================================================
    // Rule 5: order-up-to policy
    // =========================================================================

    /// Consult the policy once per week; `None` when already consulted.
    pub(crate) async fn derive_order(
        &self,
        actor: Actor,
        week: u32,
        in_transit: u32,
    ) -> Result<Option<DecisionRecord>, PipelineError> {
        let metrics = self.require_metrics(actor, week).await?;
        if metrics.order_policy_calculated {
            return Ok(None);
        }
        let snapshot = self.require_inventory(actor, week).await?;
        let observation = self.observe(actor, week, &snapshot, &metrics, in_transit).await?;
        let decision = consult(
            Arc::clone(&self.policy),
            observation,
            self.settings.policy_timeout,
        )
        .await;

        let next = ActorMetrics {
            suggested_order_quantity: decision.quantity,
            order_policy_calculated: true,
            ..metrics
        };
        self.commit(
            actor,
            Mutation::replace(Record::Metrics(metrics), Record::Metrics(next)),
            "suggested order",
        )
        .await?;
        Ok(Some(decision))
    }

    /// Assemble the policy's view of `actor` in `week`.
    async fn observe(
        &self,
        actor: Actor,
        week: u32,
        snapshot: &InventorySnapshot,
        metrics: &ActorMetrics,
        in_transit: u32,
    ) -> Result<Observation, PipelineError> {
        let reader = self.reader();
        let first = week.saturating_sub(self.settings.history_weeks).max(1);
        let mut history = Vec::new();
        for past in first..week {
            let (Some(inventory), Some(past_metrics)) = (
                reader.inventory(actor, past).await?,
                reader.metrics(actor, past).await?,
            ) else {
                continue;
            };
            let order_quantity = reader.order(actor, past).await?.map_or(0, |o| o.quantity);
            history.push(HistoryEntry {
                week: past,
                inventory: inventory.stock,
                backlog: inventory.backlog,
                demand_rate: past_metrics.demand_rate,
                order_quantity,
            });
        }

        let mut alerts = Vec::new();
        if let Some(previous) = week.checked_sub(1) {
            let amplified = reader
                .metrics(actor, previous)
                .await?
                .is_some_and(|m| m.bullwhip_risk);
            if amplified {
                alerts.push(Alert::BullwhipRisk);
            }
        }
        if metrics.stockout_risk {
            alerts.push(Alert::StockoutRisk);
        }

        Ok(Observation {
            week,
            actor,
            current: CurrentState {
                inventory: snapshot.stock,
                backlog: snapshot.backlog,
                demand_rate: metrics.demand_rate,
                coverage: metrics.inventory_coverage,
                incoming_shipments: in_transit,
            },
            history,
            alerts,
        })
    }

    // =========================================================================
    // Rule 6: create orders
    // =========================================================================

    pub(crate) async fn create_order(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<RuleOutcome, PipelineError> {
        let metrics = self.require_metrics(actor, week).await?;
        if metrics.suggested_order_quantity == 0 {
            return Ok(RuleOutcome::Skipped);
        }
        let order = Order {
            week,
            placed_by: actor,
            received_by: self.topology.supplier_of(actor),
            quantity: metrics.suggested_order_quantity,
            amplification: None,
        };
        let outcome = self.create_once(actor, Record::Order(order)).await?;
        if outcome == RuleOutcome::Executed {
            debug!(
                week,
                actor = %actor,
                supplier = %order.received_by,
                quantity = order.quantity,
                "Order placed"
            );
        }
        Ok(outcome)
    }

    // =========================================================================
    // Rule 7: create shipments
    // =========================================================================

    /// Ship every order addressed to `actor` this week, one shipment per
    /// customer.
    pub(crate) async fn create_shipments(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<RuleOutcome, PipelineError> {
        let orders = self.reader().orders_addressed_to(actor, week).await?;
        let arrival_week = week.saturating_add(self.topology.profile(actor).lead_time);
        let mut outcome = RuleOutcome::Skipped;
        for order in orders {
            let shipment = Shipment {
                week,
                shipped_from: actor,
                shipped_to: order.placed_by,
                quantity: order.quantity,
                arrival_week,
            };
            if self.create_once(actor, Record::Shipment(shipment)).await? == RuleOutcome::Executed {
                debug!(
                    week,
                    actor = %actor,
                    customer = %shipment.shipped_to,
                    quantity = shipment.quantity,
                    arrival_week,
                    "Shipment dispatched"
                );
                outcome = RuleOutcome::Executed;
            }
        }
        Ok(outcome)
    }

    // =========================================================================
    // Rule 8: bullwhip detection
    // =========================================================================

    pub(crate) async fn detect_bullwhip(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<RuleOutcome, PipelineError> {
        let reader = self.reader();
        let metrics = self.require_metrics(actor, week).await?;
        let baseline = if actor.faces_customers() {
            reader
                .customer_demand(week)
                .await?
                .map_or(metrics.demand_rate, f64::from)
        } else {
            metrics.demand_rate
        };

        let Some(order) = reader.order(actor, week).await? else {
            if !metrics.bullwhip_risk {
                return Ok(RuleOutcome::Skipped);
            }
            let next = ActorMetrics {
                bullwhip_risk: false,
                ..metrics
            };
            return self
                .commit(
                    actor,
                    Mutation::replace(Record::Metrics(metrics), Record::Metrics(next)),
                    "bullwhip flag",
                )
                .await;
        };

        let ratio = amplification(order.quantity, baseline);
        let risk = bullwhip_risk(ratio);
        if same_ratio(order.amplification, ratio) && risk == metrics.bullwhip_risk {
            return Ok(RuleOutcome::Skipped);
        }
        if risk {
            info!(week, actor = %actor, ratio = ratio.unwrap_or_default(), "Bullwhip risk");
        }
        let next_order = Order {
            amplification: ratio,
            ..order
        };
        let next_metrics = ActorMetrics {
            bullwhip_risk: risk,
            ..metrics
        };
        self.commit(
            actor,
            Mutation::replace_all(
                vec![Record::Order(order), Record::Metrics(metrics)],
                vec![Record::Order(next_order), Record::Metrics(next_metrics)],
            ),
            "bullwhip flag",
        )
        .await
    }

    // =========================================================================
    // Rule 9: total cost
    // =========================================================================

    /// Recompute the running total from every processed snapshot.
    pub(crate) async fn accrue_cost(
        &self,
        actor: Actor,
        week: u32,
    ) -> Result<RuleOutcome, PipelineError> {
        let reader = self.reader();
        let snapshots = reader.inventory_history(actor).await?;
        let next = CostTotal {
            actor,
            total: total_cost(&snapshots, self.topology.profile(actor)),
            through_week: snapshots
                .iter()
                .filter(|s| s.processed)
                .map(|s| s.week)
                .max()
                .unwrap_or(0),
        };

        match reader.cost_total(actor).await? {
            Some(current) if current == next => Ok(RuleOutcome::Skipped),
            Some(current) => {
                debug!(week, actor = %actor, total = %next.total, "Cost total updated");
                self.commit(
                    actor,
                    Mutation::replace(Record::CostTotal(current), Record::CostTotal(next)),
                    "cost total",
                )
                .await
            }
            None => {
                self.commit(actor, Mutation::create(Record::CostTotal(next)), "cost total")
                    .await
            }
        }
    }
}
