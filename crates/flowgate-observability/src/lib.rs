//! Flowgate Observability
//!
//! This crate provides observability features:
//! - Metrics collection (Prometheus) for flow resolution and load balancing

pub mod metrics;

pub use metrics::{Metrics, ResolutionOutcome};
