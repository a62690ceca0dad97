//! Exogenous customer demand.
//!
//! Demand is the only input the rules do not derive. The generator is
//! deterministic for a given configuration and seed: the random pattern
//! draws week `n` from a stream seeded with `seed + n`, so re-running or
//! resuming a week yields the same value.

use beerflow_types::DemandPattern;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DemandConfig;

/// Produces the retailer's customer demand for any week.
#[derive(Debug, Clone)]
pub struct DemandGenerator {
    config: DemandConfig,
    seed: u64,
}

impl DemandGenerator {
    /// Create a generator for `config`, seeding the random pattern.
    pub const fn new(config: DemandConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    /// The configured pattern.
    pub const fn pattern(&self) -> DemandPattern {
        self.config.pattern
    }

    /// Customer demand in `week` (weeks start at 1).
    pub fn demand_for(&self, week: u32) -> u32 {
        let cfg = &self.config;
        match cfg.pattern {
            DemandPattern::Stable => cfg.base,
            DemandPattern::Spike => {
                if week == cfg.spike_week {
                    cfg.spike
                } else {
                    cfg.base
                }
            }
            DemandPattern::Increasing => {
                let growth = cfg.step.saturating_mul(week.saturating_sub(1));
                cfg.base.saturating_add(growth)
            }
            DemandPattern::Alternating => {
                if week % 2 == 0 {
                    cfg.alternate_high
                } else {
                    cfg.base
                }
            }
            DemandPattern::Random => {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(u64::from(week)));
                rng.random_range(cfg.random_min..=cfg.random_max)
            }
        }
    }
}
