//! Static supply-chain topology.
//!
//! Who supplies whom is configuration, resolved once at startup. Every
//! upstream chain must end at a source tier: an actor with no supplier
//! that fills its own production orders.

use beerflow_types::{Actor, ActorProfile, PerActor};

use crate::config::ConfigError;

/// Validated actor profiles and the supplier relation between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    profiles: PerActor<ActorProfile>,
}

impl Topology {
    /// Validate `profiles` and build the topology.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Topology`] if any upstream chain revisits an
    /// actor instead of reaching a source tier.
    pub fn new(profiles: PerActor<ActorProfile>) -> Result<Self, ConfigError> {
        for (start, _) in profiles.iter() {
            let mut visited = vec![start];
            let mut current = start;
            while let Some(next) = profiles.get(current).upstream {
                if visited.contains(&next) {
                    return Err(ConfigError::Topology {
                        reason: format!(
                            "upstream chain from {start} cycles back to {next} instead of reaching a source tier"
                        ),
                    });
                }
                visited.push(next);
                current = next;
            }
        }
        Ok(Self { profiles })
    }

    /// Static attributes of `actor`.
    pub const fn profile(&self, actor: Actor) -> &ActorProfile {
        self.profiles.get(actor)
    }

    /// All profiles.
    pub const fn profiles(&self) -> &PerActor<ActorProfile> {
        &self.profiles
    }

    /// The actor that fills `actor`'s orders: its upstream, or itself for a
    /// source tier.
    pub fn supplier_of(&self, actor: Actor) -> Actor {
        self.profile(actor).upstream.unwrap_or(actor)
    }

    /// Whether `actor` produces rather than orders from a supplier.
    pub fn is_source(&self, actor: Actor) -> bool {
        self.profile(actor).upstream.is_none()
    }
}
