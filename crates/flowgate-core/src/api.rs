//! Deployed API definitions
//!
//! These are the already-deserialized units handed over by the deployment
//! layer: the flows declared on an API and its plans, and the endpoint groups
//! requests are proxied to. A redeploy replaces a definition wholesale.

use crate::endpoint::{Endpoint, LoadBalancerType};
use crate::flow::Flow;
use serde::{Deserialize, Serialize};

/// How flows are selected once filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowMode {
    /// Every matching flow is executed, in declared order
    #[default]
    Default,
    /// Only the most path-specific matching flow is executed
    BestMatch,
}

/// A plan and the flows it adds for its subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDefinition {
    pub id: String,
    #[serde(default)]
    pub flows: Vec<Flow>,
}

fn default_weight() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// Static configuration of one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Initial availability
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>, target: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            weight,
            enabled: true,
        }
    }

    /// Build the live endpoint for this configuration
    pub fn to_endpoint(&self) -> Endpoint {
        let endpoint = Endpoint::new(&self.name, &self.target, self.weight);
        endpoint.set_available(self.enabled);
        endpoint
    }
}

/// A balanced pool of endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointGroupConfig {
    pub name: String,
    #[serde(default)]
    pub load_balancer: LoadBalancerType,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

/// Deployment unit: flows, plans and endpoint groups of one API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub flow_mode: FlowMode,
    #[serde(default)]
    pub flows: Vec<Flow>,
    #[serde(default)]
    pub plans: Vec<PlanDefinition>,
    #[serde(default)]
    pub endpoint_groups: Vec<EndpointGroupConfig>,
}

impl ApiDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            flow_mode: FlowMode::default(),
            flows: Vec::new(),
            plans: Vec::new(),
            endpoint_groups: Vec::new(),
        }
    }

    pub fn plan(&self, id: &str) -> Option<&PlanDefinition> {
        self.plans.iter().find(|p| p.id == id)
    }

    /// Every endpoint configuration across all groups
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointConfig> + '_ {
        self.endpoint_groups.iter().flat_map(|g| g.endpoints.iter())
    }
}
