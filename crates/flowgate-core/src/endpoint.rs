//! Backend endpoint model
//!
//! An [`Endpoint`] is one backend instance a request can be proxied to. Its
//! weight is configuration; its availability is flipped at runtime by the
//! health/lifecycle subsystem and read on every balancing decision.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Load balancing strategy for an endpoint group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancerType {
    /// Uniform random across available endpoints
    Random,
    /// Random proportional to remaining weight within the current cycle
    WeightedRandom,
    /// Equal rotation across available endpoints
    #[default]
    RoundRobin,
    /// Rotation where each endpoint is picked `weight` times per cycle
    WeightedRoundRobin,
}

impl LoadBalancerType {
    /// Whether the strategy keeps per-endpoint weight ratios
    pub fn is_weighted(&self) -> bool {
        matches!(
            self,
            LoadBalancerType::WeightedRandom | LoadBalancerType::WeightedRoundRobin
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerType::Random => "random",
            LoadBalancerType::WeightedRandom => "weighted-random",
            LoadBalancerType::RoundRobin => "round-robin",
            LoadBalancerType::WeightedRoundRobin => "weighted-round-robin",
        }
    }
}

/// A live backend target
#[derive(Debug)]
pub struct Endpoint {
    name: String,
    target: String,
    weight: u32,
    available: AtomicBool,
}

impl Endpoint {
    /// Create an available endpoint
    pub fn new(name: impl Into<String>, target: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            weight,
            available: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Returns the previous availability
    pub fn set_available(&self, available: bool) -> bool {
        self.available.swap(available, Ordering::AcqRel)
    }
}
