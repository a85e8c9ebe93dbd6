use super::{LoadBalancer, WeightRatio, lock, ratios_for};
use flowgate_core::{Endpoint, LoadBalancerType};
use std::sync::{Arc, Mutex};
use tracing::warn;

struct RotationState {
    endpoints: Vec<Arc<Endpoint>>,
    ratios: Vec<WeightRatio>,
    cursor: usize,
}

impl RotationState {
    fn new(endpoints: &[Arc<Endpoint>]) -> Self {
        let ratios = ratios_for(endpoints);
        if !ratios.is_empty() && ratios.iter().all(|r| r.distribution == 0) {
            warn!(
                "Weighted round-robin pool of {} endpoints has zero total weight",
                ratios.len()
            );
        }
        Self {
            endpoints: endpoints.to_vec(),
            ratios,
            cursor: 0,
        }
    }

    fn reset(&mut self) {
        self.ratios.iter_mut().for_each(WeightRatio::reset);
        self.cursor = 0;
    }

    /// One lap from the cursor; takes the first available ratio with weight left
    fn scan(&mut self) -> Option<Arc<Endpoint>> {
        let slots = self.ratios.len();
        for step in 0..slots {
            let index = (self.cursor + step) % slots;
            let ratio = &mut self.ratios[index];
            let Some(endpoint) = self.endpoints.get(ratio.position) else {
                continue;
            };
            if ratio.runtime > 0 && endpoint.is_available() {
                ratio.runtime -= 1;
                self.cursor = (index + 1) % slots;
                return Some(Arc::clone(endpoint));
            }
        }
        None
    }
}

/// Rotation where each endpoint is picked `weight` times per cycle
///
/// With weights `[3, 1]` a cycle yields `A, B, A, A`. A cycle ends once no
/// available endpoint has weight left; every ratio is then reset and the
/// rotation restarts from the first endpoint.
pub struct WeightedRoundRobinLoadBalancer {
    state: Mutex<RotationState>,
}

impl WeightedRoundRobinLoadBalancer {
    pub fn new(endpoints: &[Arc<Endpoint>]) -> Self {
        Self {
            state: Mutex::new(RotationState::new(endpoints)),
        }
    }

    #[cfg(test)]
    fn runtimes(&self) -> Vec<u64> {
        lock(&self.state).ratios.iter().map(|r| r.runtime).collect()
    }
}

impl LoadBalancer for WeightedRoundRobinLoadBalancer {
    fn next(&self) -> Option<Arc<Endpoint>> {
        let mut state = lock(&self.state);
        if let Some(endpoint) = state.scan() {
            return Some(endpoint);
        }

        // Cycle exhausted for every available endpoint
        state.reset();
        state.scan()
    }

    fn refresh(&self, endpoints: &[Arc<Endpoint>]) {
        *lock(&self.state) = RotationState::new(endpoints);
    }

    fn kind(&self) -> LoadBalancerType {
        LoadBalancerType::WeightedRoundRobin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::{names, pool};

    #[test]
    fn test_three_to_one_cycle_repeats() {
        let balancer = WeightedRoundRobinLoadBalancer::new(&pool(&[3, 1]));

        let first: Vec<_> = (0..4).map(|_| balancer.next()).collect();
        let second: Vec<_> = (0..4).map(|_| balancer.next()).collect();

        assert_eq!(names(&first), vec!["e0", "e1", "e0", "e0"]);
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn test_cycle_counts_match_weights() {
        let balancer = WeightedRoundRobinLoadBalancer::new(&pool(&[2, 3, 1]));
        let picks: Vec<_> = (0..6).map(|_| balancer.next()).collect();
        let picked = names(&picks);

        assert_eq!(picked.iter().filter(|n| **n == "e0").count(), 2);
        assert_eq!(picked.iter().filter(|n| **n == "e1").count(), 3);
        assert_eq!(picked.iter().filter(|n| **n == "e2").count(), 1);
        assert_eq!(picked, vec!["e0", "e1", "e2", "e0", "e1", "e1"]);
    }

    #[test]
    fn test_exhausted_cycle_resets_runtimes() {
        let balancer = WeightedRoundRobinLoadBalancer::new(&pool(&[2, 1]));
        for _ in 0..3 {
            balancer.next();
        }
        assert_eq!(balancer.runtimes(), vec![0, 0]);

        assert_eq!(balancer.next().unwrap().name(), "e0");
        assert_eq!(balancer.runtimes(), vec![1, 1]);
    }

    #[test]
    fn test_unavailable_endpoint_does_not_block_cycle() {
        let endpoints = pool(&[1, 2]);
        let balancer = WeightedRoundRobinLoadBalancer::new(&endpoints);

        endpoints[1].set_available(false);
        let picks: Vec<_> = (0..3).map(|_| balancer.next()).collect();
        assert_eq!(names(&picks), vec!["e0", "e0", "e0"]);
    }

    #[test]
    fn test_zero_weight_pool_selects_nothing() {
        let balancer = WeightedRoundRobinLoadBalancer::new(&pool(&[0, 0]));
        assert!(balancer.next().is_none());

        let balancer = WeightedRoundRobinLoadBalancer::new(&pool(&[0, 1]));
        let picks: Vec<_> = (0..3).map(|_| balancer.next()).collect();
        assert_eq!(names(&picks), vec!["e1", "e1", "e1"]);
    }

    #[test]
    fn test_refresh_mid_cycle_drops_removed_endpoint() {
        let endpoints = pool(&[1, 1, 1]);
        let balancer = WeightedRoundRobinLoadBalancer::new(&endpoints);
        assert_eq!(balancer.next().unwrap().name(), "e0");
        assert_eq!(balancer.next().unwrap().name(), "e1");

        // Remove the endpoint under the cursor
        let remaining = vec![Arc::clone(&endpoints[0]), Arc::clone(&endpoints[1])];
        balancer.refresh(&remaining);

        for _ in 0..10 {
            assert_ne!(balancer.next().unwrap().name(), "e2");
        }
    }
}
