//! Flowgate Routing Engine
//!
//! This crate decides, per request, which flows apply and which endpoint
//! receives the call:
//! - Condition filters over HTTP, channel and expression selectors
//! - Ordered, lazy flow resolution with best-match narrowing
//! - Load balancers over endpoint pools
//! - Endpoint groups and per-API routing facades

pub mod api_router;
pub mod best_match;
pub mod condition;
pub mod endpoint_manager;
pub mod load_balancer;
pub mod path_matcher;
pub mod resolver;

// Re-export commonly used types
pub use api_router::{ApiRouter, GatewayRouter, RoutingDecision};
pub use best_match::{BestMatchFlowSelector, BestMatchSelector, best_match_by, for_channel, for_path};
pub use condition::{
    ChannelSelectorConditionFilter, CompositeConditionFilter, ConditionEvaluator, ConditionFilter,
    ExpressionConditionFilter, HttpSelectorConditionFilter, LiteralConditionEvaluator,
};
pub use endpoint_manager::{
    EndpointCriteria, EndpointEvent, EndpointGroup, EndpointListener, EndpointManager,
};
pub use load_balancer::{
    BalancerError, LoadBalancer, RandomLoadBalancer, RandomSource, RoundRobinLoadBalancer,
    ThreadRandom, WeightRatio, WeightedRandomLoadBalancer, WeightedRoundRobinLoadBalancer,
    build_load_balancer, build_load_balancer_with, validate_weights,
};
pub use path_matcher::PathMatcher;
pub use resolver::{
    ApiFlowResolver, BestMatchFlowResolver, ChainedFlowResolver, FlowResolver, FlowStream,
    PlanFlowResolver, filter_flows,
};
