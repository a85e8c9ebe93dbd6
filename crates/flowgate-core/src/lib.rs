//! Flowgate Core Types
//!
//! This crate provides the fundamental types used throughout Flowgate:
//! - Flow and selector definitions
//! - Endpoint model and load balancer kinds
//! - API definitions as handed over by the deployment layer
//! - Execution context and core error types

pub mod api;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod flow;

pub use api::{ApiDefinition, EndpointConfig, EndpointGroupConfig, FlowMode, PlanDefinition};
pub use context::{ExecutionContext, ExecutionMode};
pub use endpoint::{Endpoint, LoadBalancerType};
pub use error::{Error, Result};
pub use flow::{Flow, HttpMethod, Operator, Selector, SelectorKind, Step};
