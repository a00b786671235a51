use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Named numeric capacities shared across in-flight tasks.
///
/// The pool tracks both declared capacity and the amount currently reserved
/// by running tasks. All mutation happens under the owning scheduler's lock,
/// so reserve/release are plain methods rather than atomics.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResourcePool {
    capacities: HashMap<String, f64>,
    #[serde(skip)]
    in_use: HashMap<String, f64>,
}

impl ResourcePool {
    pub fn new(capacities: HashMap<String, f64>) -> Self {
        Self {
            capacities,
            in_use: HashMap::new(),
        }
    }

    /// Declared capacity for a resource; undeclared resources have none.
    pub fn capacity(&self, name: &str) -> f64 {
        self.capacities.get(name).copied().unwrap_or(0.0)
    }

    /// Capacity minus the amount reserved by running tasks.
    pub fn available(&self, name: &str) -> f64 {
        self.capacity(name) - self.in_use.get(name).copied().unwrap_or(0.0)
    }

    /// Replace declared capacities; reservations held by running tasks stay.
    pub fn replace(&mut self, capacities: HashMap<String, f64>) {
        debug!(resources = capacities.len(), "replacing resource pool capacities");
        self.capacities = capacities;
    }

    /// Whether the demand fits in the currently available capacity.
    pub fn can_admit(&self, demand: &HashMap<String, f64>) -> bool {
        demand
            .iter()
            .all(|(name, amount)| *amount <= self.available(name))
    }

    /// Reserve a running task's demand against the pool.
    pub fn reserve(&mut self, demand: &HashMap<String, f64>) {
        for (name, amount) in demand {
            *self.in_use.entry(name.clone()).or_insert(0.0) += amount;
        }
    }

    /// Release a finished task's reservation.
    pub fn release(&mut self, demand: &HashMap<String, f64>) {
        for (name, amount) in demand {
            if let Some(used) = self.in_use.get_mut(name) {
                *used = (*used - amount).max(0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demand(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs
            .iter()
            .map(|(name, amount)| (name.to_string(), *amount))
            .collect()
    }

    #[test]
    fn admission_tracks_reservations() {
        let mut pool = ResourcePool::new(demand(&[("cpu", 10.0)]));

        let first = demand(&[("cpu", 8.0)]);
        let second = demand(&[("cpu", 5.0)]);

        assert!(pool.can_admit(&first));
        pool.reserve(&first);

        assert!(!pool.can_admit(&second));
        assert_eq!(pool.available("cpu"), 2.0);

        pool.release(&first);
        assert!(pool.can_admit(&second));
    }

    #[test]
    fn undeclared_resources_have_zero_capacity() {
        let pool = ResourcePool::new(demand(&[("cpu", 4.0)]));
        assert!(!pool.can_admit(&demand(&[("gpu", 1.0)])));
        assert!(pool.can_admit(&demand(&[])));
    }

    #[test]
    fn replace_keeps_existing_reservations() {
        let mut pool = ResourcePool::new(demand(&[("cpu", 4.0)]));
        pool.reserve(&demand(&[("cpu", 3.0)]));

        pool.replace(demand(&[("cpu", 10.0)]));
        assert_eq!(pool.available("cpu"), 7.0);
    }

    #[test]
    fn release_saturates_at_zero() {
        let mut pool = ResourcePool::new(demand(&[("cpu", 4.0)]));
        pool.release(&demand(&[("cpu", 2.0)]));
        assert_eq!(pool.available("cpu"), 4.0);
    }
}
