//! Subcommand implementations

use anyhow::{Context, Result};
use flowgate_config_file::GatewayConfig;
use flowgate_core::{ExecutionContext, HttpMethod};
use flowgate_observability::Metrics;
use flowgate_routing::{ApiRouter, EndpointCriteria, LiteralConditionEvaluator, RoutingDecision};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use tracing::info;

/// Sample request described on the command line
#[derive(Debug, Clone, Default)]
pub struct RequestSpec {
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
    pub channel: Option<String>,
    pub plan: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn context(&self) -> ExecutionContext {
        let mut ctx = match (&self.channel, &self.path) {
            (Some(channel), _) => ExecutionContext::message(channel),
            (None, path) => ExecutionContext::http(path.as_deref().unwrap_or("/")),
        };
        if let Some(method) = self.method {
            ctx = ctx.with_method(method);
        }
        if let Some(plan) = &self.plan {
            ctx = ctx.with_plan(plan);
        }
        for (name, value) in &self.headers {
            ctx = ctx.with_header(name, value);
        }
        ctx
    }
}

pub fn metrics_if(enabled: bool) -> Result<Option<Arc<Metrics>>> {
    if !enabled {
        return Ok(None);
    }
    let metrics = Metrics::new().context("Failed to register metrics")?;
    Ok(Some(Arc::new(metrics)))
}

fn router_for(
    config: &GatewayConfig,
    api_id: &str,
    metrics: Option<Arc<Metrics>>,
) -> Result<ApiRouter> {
    config.validate()?;
    let api = config
        .api(api_id)
        .with_context(|| format!("Unknown API '{}'", api_id))?;

    let router = ApiRouter::from_definition(api, Arc::new(LiteralConditionEvaluator));
    Ok(match metrics {
        Some(metrics) => router.with_metrics(metrics),
        None => router,
    })
}

pub fn validate(config: &GatewayConfig) -> Result<()> {
    config.validate()?;
    print!("{}", format_summary(config));
    Ok(())
}

pub async fn resolve(
    config: &GatewayConfig,
    api_id: &str,
    request: RequestSpec,
    metrics: Option<Arc<Metrics>>,
) -> Result<()> {
    let router = router_for(config, api_id, metrics)?;
    let ctx = request.context();
    info!("Resolving flows of API '{}' for {:?} request", api_id, ctx.mode);

    let decision = router.route(&ctx).await?;
    print!("{}", format_decision(&decision));
    Ok(())
}

pub fn balance(
    config: &GatewayConfig,
    api_id: &str,
    target: Option<&str>,
    count: usize,
    metrics: Option<Arc<Metrics>>,
) -> Result<()> {
    let router = router_for(config, api_id, metrics)?;
    let criteria = target.map(EndpointCriteria::by_name);

    let mut picks: BTreeMap<String, usize> = BTreeMap::new();
    let mut misses = 0;
    for _ in 0..count {
        match router.select_endpoint(criteria.as_ref()) {
            Some(endpoint) => *picks.entry(endpoint.name().to_string()).or_default() += 1,
            None => misses += 1,
        }
    }

    print!("{}", format_distribution(&picks, misses, count));
    Ok(())
}

fn format_summary(config: &GatewayConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Configuration is valid: {} APIs", config.apis.len());
    for api in &config.apis {
        let endpoints = api.endpoints().count();
        let _ = writeln!(
            out,
            "  {} ({:?}): {} flows, {} plans, {} endpoint groups, {} endpoints",
            api.id,
            api.flow_mode,
            api.flows.len(),
            api.plans.len(),
            api.endpoint_groups.len(),
            endpoints
        );
    }
    out
}

fn format_decision(decision: &RoutingDecision) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "API '{}': {} flows",
        decision.api_id,
        decision.flows.len()
    );
    for (index, flow) in decision.flows.iter().enumerate() {
        let pre: Vec<&str> = flow.enabled_pre_steps().map(|s| s.policy.as_str()).collect();
        let post: Vec<&str> = flow.enabled_post_steps().map(|s| s.policy.as_str()).collect();
        let _ = writeln!(
            out,
            "  {}. {}  pre=[{}] post=[{}]",
            index + 1,
            flow.display_name(),
            pre.join(", "),
            post.join(", ")
        );
    }
    match &decision.endpoint {
        Some(endpoint) => {
            let _ = writeln!(out, "Endpoint: {} ({})", endpoint.name(), endpoint.target());
        }
        None => {
            let _ = writeln!(out, "Endpoint: none available");
        }
    }
    out
}

fn format_distribution(picks: &BTreeMap<String, usize>, misses: usize, count: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} selections", count);
    for (name, picked) in picks {
        let share = if count == 0 {
            0.0
        } else {
            *picked as f64 * 100.0 / count as f64
        };
        let _ = writeln!(out, "  {:<24} {:>8} {:>6.1}%", name, picked, share);
    }
    if misses > 0 {
        let _ = writeln!(out, "  {:<24} {:>8}", "(no endpoint)", misses);
    }
    out
}
