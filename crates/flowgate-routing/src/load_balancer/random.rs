use super::{LoadBalancer, RandomSource, ThreadRandom};
use flowgate_core::{Endpoint, LoadBalancerType};
use std::sync::{Arc, RwLock};

/// Uniform random choice among available endpoints
pub struct RandomLoadBalancer {
    endpoints: RwLock<Arc<Vec<Arc<Endpoint>>>>,
    random: Arc<dyn RandomSource>,
}

impl RandomLoadBalancer {
    pub fn new(endpoints: &[Arc<Endpoint>]) -> Self {
        Self::with_random(endpoints, Arc::new(ThreadRandom))
    }

    pub fn with_random(endpoints: &[Arc<Endpoint>], random: Arc<dyn RandomSource>) -> Self {
        Self {
            endpoints: RwLock::new(Arc::new(endpoints.to_vec())),
            random,
        }
    }

    fn snapshot(&self) -> Arc<Vec<Arc<Endpoint>>> {
        Arc::clone(
            &self
                .endpoints
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl LoadBalancer for RandomLoadBalancer {
    fn next(&self) -> Option<Arc<Endpoint>> {
        let pool = self.snapshot();
        // Drawn and indexed against the same list
        let available: Vec<&Arc<Endpoint>> = pool.iter().filter(|e| e.is_available()).collect();

        match available.len() {
            0 => None,
            1 => Some(Arc::clone(available[0])),
            size => {
                let index = self.random.below(size as u64) as usize;
                available.get(index).copied().cloned()
            }
        }
    }

    fn refresh(&self, endpoints: &[Arc<Endpoint>]) {
        *self
            .endpoints
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(endpoints.to_vec());
    }

    fn kind(&self) -> LoadBalancerType {
        LoadBalancerType::Random
    }
}
