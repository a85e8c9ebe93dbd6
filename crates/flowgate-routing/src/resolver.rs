//! Flow resolution
//!
//! A [`FlowResolver`] produces, for one request, the ordered sequence of flows
//! that apply to it. Sequences are lazy, pull-based streams:
//! - Order always follows declaration order; filtering never reorders.
//! - Every call re-evaluates from scratch; filter results are not cached.
//! - The first error ends the stream (fail-closed); nothing after it is emitted.
//! - Dropping a stream mid-flight cancels resolution; no shared state is touched.
//!
//! Deployed flow sets are immutable snapshots, replaced wholesale on redeploy,
//! so an in-flight resolution always sees one consistent version.

use crate::best_match::BestMatchSelector;
use crate::condition::ConditionFilter;
use flowgate_core::{ExecutionContext, Flow, PlanDefinition, Result};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Lazy, ordered sequence of flows
pub type FlowStream<'a> = BoxStream<'a, Result<Arc<Flow>>>;

type FlowSnapshot = Arc<Vec<Arc<Flow>>>;

/// Supplies and filters candidate flows for a request
pub trait FlowResolver: Send + Sync {
    /// Raw, ordered candidate flows for `ctx`
    fn provide_flows<'a>(&'a self, ctx: &'a ExecutionContext) -> FlowStream<'a>;

    /// Candidates that pass condition filtering, in provided order
    fn resolve<'a>(&'a self, ctx: &'a ExecutionContext) -> FlowStream<'a>;
}

/// Pipe `flows` through `filter`, one flow at a time, preserving order
pub fn filter_flows<'a>(
    flows: FlowStream<'a>,
    filter: &'a dyn ConditionFilter,
    ctx: &'a ExecutionContext,
) -> FlowStream<'a> {
    let filtered = flows
        .and_then(move |flow| filter.filter(ctx, flow))
        .try_filter_map(|kept| future::ready(Ok(kept)))
        .boxed();
    fuse_on_error(filtered)
}

/// End the stream right after the first error
///
/// The inner stream is not polled again once an error was emitted, so no
/// further conditions are evaluated.
pub fn fuse_on_error(flows: FlowStream<'_>) -> FlowStream<'_> {
    stream::unfold(Some(flows), |state| async move {
        let mut flows = state?;
        match flows.next().await? {
            Ok(flow) => Some((Ok(flow), Some(flows))),
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

fn snapshot_of(flows: Vec<Flow>) -> FlowSnapshot {
    Arc::new(flows.into_iter().map(Arc::new).collect())
}

/// Enabled flows of a snapshot, in declared order
fn enabled_flows<'a>(snapshot: FlowSnapshot) -> FlowStream<'a> {
    let len = snapshot.len();
    stream::iter((0..len).filter_map(move |i| {
        let flow = &snapshot[i];
        flow.enabled.then(|| Ok(Arc::clone(flow)))
    }))
    .boxed()
}

/// Resolves the flows declared directly on an API
pub struct ApiFlowResolver {
    api_id: String,
    flows: RwLock<FlowSnapshot>,
    filter: Arc<dyn ConditionFilter>,
}

impl ApiFlowResolver {
    pub fn new(api_id: impl Into<String>, flows: Vec<Flow>, filter: Arc<dyn ConditionFilter>) -> Self {
        Self {
            api_id: api_id.into(),
            flows: RwLock::new(snapshot_of(flows)),
            filter,
        }
    }

    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    /// Current deployed flows, including disabled ones
    pub fn flows(&self) -> FlowSnapshot {
        Arc::clone(
            &self
                .flows
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    /// Replace the deployed flows; resolutions already running keep their snapshot
    pub fn redeploy(&self, flows: Vec<Flow>) {
        let snapshot = snapshot_of(flows);
        info!(
            "Redeploying {} flows for API '{}'",
            snapshot.len(),
            self.api_id
        );
        *self
            .flows
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
    }
}

impl FlowResolver for ApiFlowResolver {
    fn provide_flows<'a>(&'a self, _ctx: &'a ExecutionContext) -> FlowStream<'a> {
        enabled_flows(self.flows())
    }

    fn resolve<'a>(&'a self, ctx: &'a ExecutionContext) -> FlowStream<'a> {
        filter_flows(self.provide_flows(ctx), self.filter.as_ref(), ctx)
    }
}

/// Resolves the flows of the plan the request came through
///
/// Requests without a plan, or with an unknown plan, get no plan flows.
pub struct PlanFlowResolver {
    plans: RwLock<Arc<HashMap<String, FlowSnapshot>>>,
    filter: Arc<dyn ConditionFilter>,
}

impl PlanFlowResolver {
    pub fn new(plans: Vec<PlanDefinition>, filter: Arc<dyn ConditionFilter>) -> Self {
        Self {
            plans: RwLock::new(Self::index(plans)),
            filter,
        }
    }

    fn index(plans: Vec<PlanDefinition>) -> Arc<HashMap<String, FlowSnapshot>> {
        Arc::new(
            plans
                .into_iter()
                .map(|plan| (plan.id, snapshot_of(plan.flows)))
                .collect(),
        )
    }

    fn plan_flows(&self, plan_id: &str) -> Option<FlowSnapshot> {
        self.plans
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(plan_id)
            .cloned()
    }

    pub fn redeploy(&self, plans: Vec<PlanDefinition>) {
        let index = Self::index(plans);
        info!("Redeploying flows for {} plans", index.len());
        *self
            .plans
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = index;
    }
}

impl FlowResolver for PlanFlowResolver {
    fn provide_flows<'a>(&'a self, ctx: &'a ExecutionContext) -> FlowStream<'a> {
        match ctx.plan_id.as_deref().and_then(|id| self.plan_flows(id)) {
            Some(snapshot) => enabled_flows(snapshot),
            None => stream::empty().boxed(),
        }
    }

    fn resolve<'a>(&'a self, ctx: &'a ExecutionContext) -> FlowStream<'a> {
        filter_flows(self.provide_flows(ctx), self.filter.as_ref(), ctx)
    }
}

/// Concatenates several resolvers, in the order given
pub struct ChainedFlowResolver {
    resolvers: Vec<Arc<dyn FlowResolver>>,
}

impl ChainedFlowResolver {
    pub fn new(resolvers: Vec<Arc<dyn FlowResolver>>) -> Self {
        Self { resolvers }
    }
}

impl FlowResolver for ChainedFlowResolver {
    fn provide_flows<'a>(&'a self, ctx: &'a ExecutionContext) -> FlowStream<'a> {
        let chained = stream::iter(self.resolvers.iter())
            .flat_map(move |resolver| resolver.provide_flows(ctx))
            .boxed();
        fuse_on_error(chained)
    }

    fn resolve<'a>(&'a self, ctx: &'a ExecutionContext) -> FlowStream<'a> {
        let chained = stream::iter(self.resolvers.iter())
            .flat_map(move |resolver| resolver.resolve(ctx))
            .boxed();
        fuse_on_error(chained)
    }
}

/// Narrows an upstream resolution down to its single best match
///
/// The upstream sequence must be finite: it is collected entirely before the
/// selector runs.
pub struct BestMatchFlowResolver {
    upstream: Arc<dyn FlowResolver>,
    selector: Arc<dyn BestMatchSelector>,
}

impl BestMatchFlowResolver {
    pub fn new(upstream: Arc<dyn FlowResolver>, selector: Arc<dyn BestMatchSelector>) -> Self {
        Self { upstream, selector }
    }
}

impl FlowResolver for BestMatchFlowResolver {
    /// The upstream's resolved flows
    fn provide_flows<'a>(&'a self, ctx: &'a ExecutionContext) -> FlowStream<'a> {
        self.upstream.resolve(ctx)
    }

    fn resolve<'a>(&'a self, ctx: &'a ExecutionContext) -> FlowStream<'a> {
        let selected = async move {
            let candidates: Vec<Arc<Flow>> = self.provide_flows(ctx).try_collect().await?;
            Ok(self.selector.select(&candidates, ctx))
        };
        stream::once(selected)
            .filter_map(|selected: Result<Option<Arc<Flow>>>| future::ready(selected.transpose()))
            .boxed()
    }
}
