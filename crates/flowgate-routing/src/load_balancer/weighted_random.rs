use super::{LoadBalancer, RandomSource, ThreadRandom, WeightRatio, lock, ratios_for};
use flowgate_core::{Endpoint, LoadBalancerType};
use std::sync::{Arc, Mutex};
use tracing::warn;

struct DrawState {
    endpoints: Vec<Arc<Endpoint>>,
    ratios: Vec<WeightRatio>,
    /// Runtime weight left in the cycle, across all ratios
    remaining: u64,
}

impl DrawState {
    fn new(endpoints: &[Arc<Endpoint>]) -> Self {
        let mut state = Self {
            endpoints: endpoints.to_vec(),
            ratios: ratios_for(endpoints),
            remaining: 0,
        };
        state.reset();
        if !state.ratios.is_empty() && state.remaining == 0 {
            warn!(
                "Weighted random pool of {} endpoints has zero total weight",
                state.ratios.len()
            );
        }
        state
    }

    fn reset(&mut self) {
        self.ratios.iter_mut().for_each(WeightRatio::reset);
        self.remaining = self
            .ratios
            .iter()
            .fold(0u64, |sum, r| sum.saturating_add(r.distribution));
    }

    fn is_available(&self, ratio: &WeightRatio) -> bool {
        self.endpoints
            .get(ratio.position)
            .is_some_and(|e| e.is_available())
    }

    /// Remaining weight of available endpoints
    fn available_remaining(&self) -> u64 {
        self.ratios
            .iter()
            .filter(|r| self.is_available(r))
            .fold(0u64, |sum, r| sum.saturating_add(r.runtime))
    }
}

/// Random choice proportional to each endpoint's remaining weight in the cycle
///
/// Every pick spends one unit of the chosen endpoint's weight, so over one
/// cycle each endpoint is picked exactly `weight` times, in random order.
pub struct WeightedRandomLoadBalancer {
    state: Mutex<DrawState>,
    random: Arc<dyn RandomSource>,
}

impl WeightedRandomLoadBalancer {
    pub fn new(endpoints: &[Arc<Endpoint>]) -> Self {
        Self::with_random(endpoints, Arc::new(ThreadRandom))
    }

    pub fn with_random(endpoints: &[Arc<Endpoint>], random: Arc<dyn RandomSource>) -> Self {
        Self {
            state: Mutex::new(DrawState::new(endpoints)),
            random,
        }
    }
}

impl LoadBalancer for WeightedRandomLoadBalancer {
    fn next(&self) -> Option<Arc<Endpoint>> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        let mut available = state.available_remaining();
        if state.remaining == 0 || available == 0 {
            state.reset();
            available = state.available_remaining();
        }
        if available == 0 {
            return None;
        }

        let draw = self.random.below(available);
        let mut reached = 0u64;
        for ratio in state.ratios.iter_mut() {
            let Some(endpoint) = state.endpoints.get(ratio.position) else {
                continue;
            };
            if !endpoint.is_available() {
                continue;
            }
            reached = reached.saturating_add(ratio.runtime);
            if reached > draw {
                ratio.runtime -= 1;
                state.remaining = state.remaining.saturating_sub(1);
                return Some(Arc::clone(endpoint));
            }
        }
        None
    }

    fn refresh(&self, endpoints: &[Arc<Endpoint>]) {
        *lock(&self.state) = DrawState::new(endpoints);
    }

    fn kind(&self) -> LoadBalancerType {
        LoadBalancerType::WeightedRandom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::{ScriptedRandom, names, pool};
    use std::collections::HashMap;

    #[test]
    fn test_draw_walks_remaining_weights() {
        // Weights [2, 1]: draw 2 lands on e1, then draws 0 exhaust e0
        let random = Arc::new(ScriptedRandom::new(vec![2, 0, 0]));
        let balancer = WeightedRandomLoadBalancer::with_random(&pool(&[2, 1]), random.clone());

        let picks: Vec<_> = (0..3).map(|_| balancer.next()).collect();
        assert_eq!(names(&picks), vec!["e1", "e0", "e0"]);
        assert_eq!(random.calls(), 3);
    }

    #[test]
    fn test_exhausted_endpoint_not_reselected_within_cycle() {
        // Always draw the highest value: e1 once, then only e0 is left
        let random = Arc::new(ScriptedRandom::new(vec![u64::MAX]));
        let balancer = WeightedRandomLoadBalancer::with_random(&pool(&[3, 1]), random);

        let cycle: Vec<_> = (0..4).map(|_| balancer.next()).collect();
        let picked = names(&cycle);
        assert_eq!(picked.iter().filter(|n| **n == "e0").count(), 3);
        assert_eq!(picked.iter().filter(|n| **n == "e1").count(), 1);
    }

    #[test]
    fn test_nine_to_one_bias() {
        let balancer = WeightedRandomLoadBalancer::new(&pool(&[9, 1]));
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..10_000 {
            let endpoint = balancer.next().unwrap();
            *counts.entry(endpoint.name().to_string()).or_default() += 1;
        }

        let heavy = counts["e0"] as f64;
        let light = counts["e1"] as f64;
        let ratio = heavy / light;
        assert!((8.5..=9.5).contains(&ratio), "observed ratio {}", ratio);
    }

    #[test]
    fn test_zero_weight_pool_selects_nothing() {
        let random = Arc::new(ScriptedRandom::new(vec![0]));
        let balancer = WeightedRandomLoadBalancer::with_random(&pool(&[0, 0]), random.clone());

        assert!(balancer.next().is_none());
        assert_eq!(random.calls(), 0);
    }

    #[test]
    fn test_unavailable_weight_is_not_drawn() {
        let endpoints = pool(&[5, 5]);
        endpoints[0].set_available(false);
        let balancer = WeightedRandomLoadBalancer::new(&endpoints);

        for _ in 0..20 {
            assert_eq!(balancer.next().unwrap().name(), "e1");
        }
    }

    #[test]
    fn test_refresh_mid_cycle_drops_removed_endpoint() {
        let endpoints = pool(&[1, 1, 1]);
        let balancer = WeightedRandomLoadBalancer::new(&endpoints);
        balancer.next();

        let remaining = vec![Arc::clone(&endpoints[1])];
        balancer.refresh(&remaining);

        for _ in 0..10 {
            assert_eq!(balancer.next().unwrap().name(), "e1");
        }
    }
}
