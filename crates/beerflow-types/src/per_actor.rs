//! A total map from [`Actor`] to a value.

use serde::{Deserialize, Serialize};

use crate::enums::Actor;

/// One value per actor, addressable without a fallible lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerActor<T> {
    /// Value for the retailer.
    #[serde(default)]
    pub retailer: T,
    /// Value for the wholesaler.
    #[serde(default)]
    pub wholesaler: T,
    /// Value for the distributor.
    #[serde(default)]
    pub distributor: T,
    /// Value for the factory.
    #[serde(default)]
    pub factory: T,
}

impl<T> PerActor<T> {
    /// Build by calling `f` once per actor in chain order.
    pub fn from_fn(mut f: impl FnMut(Actor) -> T) -> Self {
        Self {
            retailer: f(Actor::Retailer),
            wholesaler: f(Actor::Wholesaler),
            distributor: f(Actor::Distributor),
            factory: f(Actor::Factory),
        }
    }

    /// The value for `actor`.
    pub const fn get(&self, actor: Actor) -> &T {
        match actor {
            Actor::Retailer => &self.retailer,
            Actor::Wholesaler => &self.wholesaler,
            Actor::Distributor => &self.distributor,
            Actor::Factory => &self.factory,
        }
    }

    /// Mutable access to the value for `actor`.
    pub const fn get_mut(&mut self, actor: Actor) -> &mut T {
        match actor {
            Actor::Retailer => &mut self.retailer,
            Actor::Wholesaler => &mut self.wholesaler,
            Actor::Distributor => &mut self.distributor,
            Actor::Factory => &mut self.factory,
        }
    }

    /// Iterate `(actor, value)` pairs in chain order.
    pub fn iter(&self) -> impl Iterator<Item = (Actor, &T)> {
        Actor::ALL.into_iter().map(|actor| (actor, self.get(actor)))
    }

    /// Transform every value.
    pub fn map<U>(&self, mut f: impl FnMut(Actor, &T) -> U) -> PerActor<U> {
        PerActor::from_fn(|actor| f(actor, self.get(actor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fn_visits_every_actor() {
        let names = PerActor::from_fn(Actor::as_str);
        assert_eq!(*names.get(Actor::Distributor), "distributor");
        assert_eq!(names.iter().count(), 4);
    }

    #[test]
    fn get_mut_targets_one_actor() {
        let mut counts = PerActor::<u32>::default();
        *counts.get_mut(Actor::Factory) += 2;
        assert_eq!(counts.factory, 2);
        assert_eq!(counts.retailer, 0);
    }
}
