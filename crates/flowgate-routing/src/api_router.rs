//! Per-API routing facade
//!
//! Wires one [`ApiDefinition`] into a resolution pipeline and its endpoint
//! groups. Flows come from the API itself, then from the request's plan; in
//! best-match mode each source is narrowed to its single most specific flow.

use crate::best_match::BestMatchFlowSelector;
use crate::condition::{CompositeConditionFilter, ConditionEvaluator, ConditionFilter};
use crate::endpoint_manager::{EndpointCriteria, EndpointManager};
use crate::resolver::{
    ApiFlowResolver, BestMatchFlowResolver, ChainedFlowResolver, FlowResolver, PlanFlowResolver,
};
use dashmap::DashMap;
use flowgate_core::{
    ApiDefinition, Endpoint, Error, ExecutionContext, Flow, FlowMode, PlanDefinition, Result,
};
use flowgate_observability::{Metrics, ResolutionOutcome};
use futures::TryStreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Flows to execute and the endpoint to proxy to, for one request
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub api_id: String,
    /// Resolved flows, in execution order
    pub flows: Vec<Arc<Flow>>,
    /// `None` when no endpoint is available
    pub endpoint: Option<Arc<Endpoint>>,
}

impl RoutingDecision {
    /// Enabled pre-steps of every flow, flattened in execution order
    pub fn pre_policies(&self) -> Vec<&str> {
        self.flows
            .iter()
            .flat_map(|flow| flow.enabled_pre_steps())
            .map(|step| step.policy.as_str())
            .collect()
    }

    pub fn post_policies(&self) -> Vec<&str> {
        self.flows
            .iter()
            .flat_map(|flow| flow.enabled_post_steps())
            .map(|step| step.policy.as_str())
            .collect()
    }
}

/// Routing for one deployed API
pub struct ApiRouter {
    api_id: String,
    flow_mode: FlowMode,
    api_flows: Arc<ApiFlowResolver>,
    plan_flows: Arc<PlanFlowResolver>,
    resolver: Arc<dyn FlowResolver>,
    endpoints: EndpointManager,
    metrics: Option<Arc<Metrics>>,
}

impl ApiRouter {
    /// Build the router of `api` with the standard condition filters
    pub fn from_definition(api: &ApiDefinition, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self::with_filter(api, Arc::new(CompositeConditionFilter::standard(evaluator)))
    }

    /// Build the router of `api` around a custom condition filter
    pub fn with_filter(api: &ApiDefinition, filter: Arc<dyn ConditionFilter>) -> Self {
        let api_flows = Arc::new(ApiFlowResolver::new(
            &api.id,
            api.flows.clone(),
            Arc::clone(&filter),
        ));
        let plan_flows = Arc::new(PlanFlowResolver::new(api.plans.clone(), filter));

        let sources: Vec<Arc<dyn FlowResolver>> = match api.flow_mode {
            FlowMode::Default => vec![api_flows.clone(), plan_flows.clone()],
            FlowMode::BestMatch => vec![
                Arc::new(BestMatchFlowResolver::new(
                    api_flows.clone(),
                    Arc::new(BestMatchFlowSelector),
                )),
                Arc::new(BestMatchFlowResolver::new(
                    plan_flows.clone(),
                    Arc::new(BestMatchFlowSelector),
                )),
            ],
        };

        info!(
            "Deployed API '{}' with {} flows, {} plans and {} endpoint groups",
            api.id,
            api.flows.len(),
            api.plans.len(),
            api.endpoint_groups.len()
        );

        Self {
            api_id: api.id.clone(),
            flow_mode: api.flow_mode,
            api_flows,
            plan_flows,
            resolver: Arc::new(ChainedFlowResolver::new(sources)),
            endpoints: EndpointManager::from_configs(&api.endpoint_groups),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.endpoints = self.endpoints.with_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
        self
    }

    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    pub fn flow_mode(&self) -> FlowMode {
        self.flow_mode
    }

    /// The full resolution pipeline
    pub fn resolver(&self) -> &Arc<dyn FlowResolver> {
        &self.resolver
    }

    pub fn endpoints(&self) -> &EndpointManager {
        &self.endpoints
    }

    /// Resolve the flows that apply to `ctx`, in execution order
    pub async fn resolve_flows(&self, ctx: &ExecutionContext) -> Result<Vec<Arc<Flow>>> {
        let started = Instant::now();
        let resolved: Result<Vec<Arc<Flow>>> = self.resolver.resolve(ctx).try_collect().await;
        let elapsed = started.elapsed().as_secs_f64();

        let (outcome, count) = match &resolved {
            Ok(flows) if flows.is_empty() => (ResolutionOutcome::Empty, 0),
            Ok(flows) => (ResolutionOutcome::Matched, flows.len()),
            Err(_) => (ResolutionOutcome::Error, 0),
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_resolution(&self.api_id, outcome, count, elapsed);
        }

        match &resolved {
            Ok(flows) => debug!(
                "Resolved {} flows for API '{}' on '{}'",
                flows.len(),
                self.api_id,
                ctx.path
            ),
            Err(e) => debug!("Flow resolution failed for API '{}': {}", self.api_id, e),
        }
        resolved
    }

    /// Pick an endpoint, optionally constrained to a name
    pub fn select_endpoint(&self, criteria: Option<&EndpointCriteria>) -> Option<Arc<Endpoint>> {
        match criteria {
            Some(criteria) => self.endpoints.next_for(criteria),
            None => self.endpoints.next(),
        }
    }

    /// Resolve flows, then pick an endpoint
    ///
    /// No endpoint is picked when resolution fails.
    pub async fn route(&self, ctx: &ExecutionContext) -> Result<RoutingDecision> {
        let flows = self.resolve_flows(ctx).await?;
        Ok(RoutingDecision {
            api_id: self.api_id.clone(),
            flows,
            endpoint: self.select_endpoint(None),
        })
    }

    /// Replace the API-level flows
    pub fn redeploy_flows(&self, flows: Vec<Flow>) {
        self.api_flows.redeploy(flows);
    }

    /// Replace every plan and its flows
    pub fn redeploy_plans(&self, plans: Vec<PlanDefinition>) {
        self.plan_flows.redeploy(plans);
    }
}

/// Routers of every deployed API, by API id
pub struct GatewayRouter {
    routers: DashMap<String, Arc<ApiRouter>>,
    evaluator: Arc<dyn ConditionEvaluator>,
    metrics: Option<Arc<Metrics>>,
}

impl GatewayRouter {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self {
            routers: DashMap::new(),
            evaluator,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Deploy every API of `apis`
    pub fn from_definitions(apis: &[ApiDefinition], evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        let gateway = Self::new(evaluator);
        for api in apis {
            gateway.deploy(api);
        }
        gateway
    }

    /// Deploy `api`, replacing any router with the same id
    pub fn deploy(&self, api: &ApiDefinition) -> Arc<ApiRouter> {
        let mut router = ApiRouter::from_definition(api, Arc::clone(&self.evaluator));
        if let Some(metrics) = &self.metrics {
            router = router.with_metrics(Arc::clone(metrics));
        }
        let router = Arc::new(router);
        self.routers.insert(api.id.clone(), Arc::clone(&router));
        router
    }

    pub fn undeploy(&self, api_id: &str) -> Option<Arc<ApiRouter>> {
        let removed = self.routers.remove(api_id).map(|(_, router)| router);
        if removed.is_some() {
            info!("Undeployed API '{}'", api_id);
        }
        removed
    }

    pub fn router(&self, api_id: &str) -> Result<Arc<ApiRouter>> {
        self.routers
            .get(api_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UnknownApi(api_id.to_string()))
    }

    /// Deployed API ids, sorted
    pub fn api_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.routers.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub async fn route(&self, api_id: &str, ctx: &ExecutionContext) -> Result<RoutingDecision> {
        let router = self.router(api_id)?;
        router.route(ctx).await
    }
}
