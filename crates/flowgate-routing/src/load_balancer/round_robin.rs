use super::LoadBalancer;
use flowgate_core::{Endpoint, LoadBalancerType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Equal rotation across available endpoints
///
/// The rotation counter wraps at `usize::MAX`.
pub struct RoundRobinLoadBalancer {
    endpoints: RwLock<Arc<Vec<Arc<Endpoint>>>>,
    counter: AtomicUsize,
}

impl RoundRobinLoadBalancer {
    pub fn new(endpoints: &[Arc<Endpoint>]) -> Self {
        Self {
            endpoints: RwLock::new(Arc::new(endpoints.to_vec())),
            counter: AtomicUsize::new(0),
        }
    }
}

impl LoadBalancer for RoundRobinLoadBalancer {
    fn next(&self) -> Option<Arc<Endpoint>> {
        let pool = Arc::clone(
            &self
                .endpoints
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        let available: Vec<&Arc<Endpoint>> = pool.iter().filter(|e| e.is_available()).collect();
        if available.is_empty() {
            return None;
        }

        let turn = self.counter.fetch_add(1, Ordering::AcqRel);
        available.get(turn % available.len()).copied().cloned()
    }

    fn refresh(&self, endpoints: &[Arc<Endpoint>]) {
        *self
            .endpoints
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(endpoints.to_vec());
        self.counter.store(0, Ordering::Release);
    }

    fn kind(&self) -> LoadBalancerType {
        LoadBalancerType::RoundRobin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::{names, pool};

    #[test]
    fn test_rotates_in_order() {
        let balancer = RoundRobinLoadBalancer::new(&pool(&[1, 1, 1]));
        let picks: Vec<_> = (0..6).map(|_| balancer.next()).collect();
        assert_eq!(names(&picks), vec!["e0", "e1", "e2", "e0", "e1", "e2"]);
    }

    #[test]
    fn test_ignores_weights() {
        let balancer = RoundRobinLoadBalancer::new(&pool(&[5, 1]));
        let picks: Vec<_> = (0..4).map(|_| balancer.next()).collect();
        assert_eq!(names(&picks), vec!["e0", "e1", "e0", "e1"]);
    }

    #[test]
    fn test_counter_wraps() {
        let balancer = RoundRobinLoadBalancer::new(&pool(&[1, 1]));
        balancer.counter.store(usize::MAX, Ordering::SeqCst);

        assert!(balancer.next().is_some());
        assert!(balancer.next().is_some());
        assert!(balancer.counter.load(Ordering::SeqCst) < 2);
    }

    #[test]
    fn test_refresh_restarts_rotation() {
        let balancer = RoundRobinLoadBalancer::new(&pool(&[1, 1, 1]));
        balancer.next();
        balancer.refresh(&pool(&[1, 1]));

        let picks: Vec<_> = (0..2).map(|_| balancer.next()).collect();
        assert_eq!(names(&picks), vec!["e0", "e1"]);
    }
}
