//! Endpoint load balancing
//!
//! Every strategy implements [`LoadBalancer`]:
//! - `next()` picks one available endpoint, or `None` when nothing is selectable
//! - `refresh()` rebuilds the strategy's private state after a pool change
//!
//! Availability is read on every call, since it flips concurrently; an
//! unavailable endpoint is skipped without being removed from the pool.
//!
//! ## Strategies
//!
//! ### Random
//! Uniform choice among the available endpoints. A single candidate is
//! returned without drawing.
//!
//! ```rust
//! use flowgate_core::{Endpoint, LoadBalancerType};
//! use flowgate_routing::{LoadBalancer, build_load_balancer};
//! use std::sync::Arc;
//!
//! let pool = vec![
//!     Arc::new(Endpoint::new("a", "http://a:8080", 1)),
//!     Arc::new(Endpoint::new("b", "http://b:8080", 1)),
//! ];
//! pool[1].set_available(false);
//!
//! let balancer = build_load_balancer(LoadBalancerType::Random, &pool);
//! for _ in 0..10 {
//!     assert_eq!(balancer.next().unwrap().name(), "a");
//! }
//! ```
//!
//! ### Round-Robin
//! Equal rotation across the available endpoints.
//!
//! ```rust
//! use flowgate_core::{Endpoint, LoadBalancerType};
//! use flowgate_routing::{LoadBalancer, build_load_balancer};
//! use std::sync::Arc;
//!
//! let pool = vec![
//!     Arc::new(Endpoint::new("a", "http://a:8080", 1)),
//!     Arc::new(Endpoint::new("b", "http://b:8080", 1)),
//! ];
//!
//! let balancer = build_load_balancer(LoadBalancerType::RoundRobin, &pool);
//! let picks: Vec<String> = (0..3)
//!     .filter_map(|_| balancer.next())
//!     .map(|e| e.name().to_string())
//!     .collect();
//! assert_eq!(picks, ["a", "b", "a"]); // wraps
//! ```
//!
//! ### Weighted Round-Robin
//! Each endpoint is picked `weight` times per cycle, visiting the pool in
//! order. The cycle restarts from the first endpoint once every available
//! endpoint has spent its weight.
//!
//! ```rust
//! use flowgate_core::{Endpoint, LoadBalancerType};
//! use flowgate_routing::{LoadBalancer, build_load_balancer};
//! use std::sync::Arc;
//!
//! let pool = vec![
//!     Arc::new(Endpoint::new("primary", "http://primary:8080", 3)),
//!     Arc::new(Endpoint::new("backup", "http://backup:8080", 1)),
//! ];
//!
//! let balancer = build_load_balancer(LoadBalancerType::WeightedRoundRobin, &pool);
//! let picks: Vec<String> = (0..4)
//!     .filter_map(|_| balancer.next())
//!     .map(|e| e.name().to_string())
//!     .collect();
//! assert_eq!(picks, ["primary", "backup", "primary", "primary"]);
//! ```
//!
//! ### Weighted Random
//! Random draw proportional to the weight each endpoint has left in the
//! current cycle. Over one cycle every endpoint is picked exactly `weight`
//! times, in random order.
//!
//! ```rust
//! use flowgate_core::{Endpoint, LoadBalancerType};
//! use flowgate_routing::{LoadBalancer, build_load_balancer};
//! use std::sync::Arc;
//!
//! let pool = vec![
//!     Arc::new(Endpoint::new("heavy", "http://heavy:8080", 3)),
//!     Arc::new(Endpoint::new("light", "http://light:8080", 1)),
//! ];
//!
//! let balancer = build_load_balancer(LoadBalancerType::WeightedRandom, &pool);
//! let heavy = (0..4)
//!     .filter_map(|_| balancer.next())
//!     .filter(|e| e.name() == "heavy")
//!     .count();
//! assert_eq!(heavy, 3);
//! ```
//!
//! Draws go through a [`RandomSource`]; [`build_load_balancer_with`] plugs in
//! a deterministic one.
//!
//! ## Thread Safety
//!
//! - **Snapshots**: random and round-robin read an `Arc` of the pool under a
//!   `RwLock`; `refresh` swaps the whole list, so a pick never sees a half
//!   applied change
//! - **Lock-free rotation**: the round-robin counter is an `AtomicUsize`
//!   that wraps at `usize::MAX`
//! - **Critical sections**: weighted strategies keep per-endpoint
//!   [`WeightRatio`] bookkeeping behind one mutex per balancer; the whole
//!   read-decrement-return sequence of `next()` and every rebuild run inside it
//! - **Poison tolerant**: a panic while a lock is held never disables a balancer
//!
//! ## Validation
//!
//! Weighted pools are checked before deployment:
//!
//! ```rust
//! use flowgate_routing::{BalancerError, validate_weights};
//!
//! assert_eq!(validate_weights([3, 1]), Ok(4));
//! assert_eq!(validate_weights([0, 0]), Err(BalancerError::ZeroTotalWeight));
//! assert_eq!(validate_weights(Vec::<u32>::new()), Err(BalancerError::EmptyPool));
//! ```
//!
//! At runtime a zero total weight is logged and selects nothing.

mod random;
mod round_robin;
mod weighted_random;
mod weighted_round_robin;

pub use random::RandomLoadBalancer;
pub use round_robin::RoundRobinLoadBalancer;
pub use weighted_random::WeightedRandomLoadBalancer;
pub use weighted_round_robin::WeightedRoundRobinLoadBalancer;

use flowgate_core::{Endpoint, LoadBalancerType};
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Picks one endpoint per call from an endpoint pool
pub trait LoadBalancer: Send + Sync {
    /// Next endpoint, `None` when no endpoint is selectable
    fn next(&self) -> Option<Arc<Endpoint>>;

    /// Replace the balanced pool
    fn refresh(&self, endpoints: &[Arc<Endpoint>]);

    fn kind(&self) -> LoadBalancerType;
}

/// Source of uniform random integers
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[0, bound)`; `bound` is never zero
    fn below(&self, bound: u64) -> u64;
}

/// Thread-local generator from `rand`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        rand::rng().random_range(0..bound)
    }
}

/// Remaining draw weight of one endpoint within the current cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightRatio {
    /// Index of the endpoint in the balanced pool
    pub position: usize,
    /// Configured weight
    pub distribution: u64,
    /// Weight left in this cycle
    pub runtime: u64,
}

impl WeightRatio {
    pub fn new(position: usize, distribution: u32) -> Self {
        Self {
            position,
            distribution: u64::from(distribution),
            runtime: u64::from(distribution),
        }
    }

    pub fn reset(&mut self) {
        self.runtime = self.distribution;
    }
}

/// Fresh ratios, positions `0..N`
pub(crate) fn ratios_for(endpoints: &[Arc<Endpoint>]) -> Vec<WeightRatio> {
    endpoints
        .iter()
        .enumerate()
        .map(|(position, endpoint)| WeightRatio::new(position, endpoint.weight()))
        .collect()
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Weight configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalancerError {
    #[error("Endpoint pool cannot be empty")]
    EmptyPool,

    #[error("Total endpoint weight must be greater than 0")]
    ZeroTotalWeight,

    #[error("Total endpoint weight overflows u32")]
    WeightOverflow,
}

/// Check that a weighted pool can ever select anything
///
/// Returns the total weight.
///
/// # Errors
///
/// - [`BalancerError::EmptyPool`] when there are no weights
/// - [`BalancerError::ZeroTotalWeight`] when every weight is 0
/// - [`BalancerError::WeightOverflow`] when the sum does not fit a `u32`
pub fn validate_weights<I>(weights: I) -> Result<u32, BalancerError>
where
    I: IntoIterator<Item = u32>,
{
    let mut weights = weights.into_iter().peekable();
    if weights.peek().is_none() {
        return Err(BalancerError::EmptyPool);
    }

    let total = weights
        .try_fold(0u32, |acc, weight| acc.checked_add(weight))
        .ok_or(BalancerError::WeightOverflow)?;

    if total == 0 {
        return Err(BalancerError::ZeroTotalWeight);
    }

    Ok(total)
}

/// Build a balancer of `kind` over `endpoints`
pub fn build_load_balancer(
    kind: LoadBalancerType,
    endpoints: &[Arc<Endpoint>],
) -> Arc<dyn LoadBalancer> {
    build_load_balancer_with(kind, endpoints, Arc::new(ThreadRandom))
}

/// Build a balancer of `kind` drawing from `random`
pub fn build_load_balancer_with(
    kind: LoadBalancerType,
    endpoints: &[Arc<Endpoint>],
    random: Arc<dyn RandomSource>,
) -> Arc<dyn LoadBalancer> {
    match kind {
        LoadBalancerType::Random => Arc::new(RandomLoadBalancer::with_random(endpoints, random)),
        LoadBalancerType::RoundRobin => Arc::new(RoundRobinLoadBalancer::new(endpoints)),
        LoadBalancerType::WeightedRandom => {
            Arc::new(WeightedRandomLoadBalancer::with_random(endpoints, random))
        }
        LoadBalancerType::WeightedRoundRobin => {
            Arc::new(WeightedRoundRobinLoadBalancer::new(endpoints))
        }
    }
}
