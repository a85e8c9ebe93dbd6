//! Condition filters
//!
//! A [`ConditionFilter`] decides, per request, whether a candidate flow is
//! kept. Filters never mutate flows and may be asynchronous (expression
//! evaluation can go through an external engine). Evaluation errors are
//! returned to the caller, never turned into a silent non-match.
//!
//! Selector filters only look at the selector kind relevant to the active
//! [`ExecutionMode`]: HTTP selectors in `Http` mode, channel selectors in
//! `Message` mode. Condition selectors are evaluated in both modes.

use crate::path_matcher::PathMatcher;
use async_trait::async_trait;
use flowgate_core::{
    Error, ExecutionContext, ExecutionMode, Flow, Operator, Result, Selector,
};
use std::sync::Arc;
use tracing::debug;

/// Keeps or drops a candidate flow for the current request
#[async_trait]
pub trait ConditionFilter: Send + Sync {
    /// Returns the flow if it applies to `ctx`, `None` otherwise
    async fn filter(&self, ctx: &ExecutionContext, flow: Arc<Flow>) -> Result<Option<Arc<Flow>>>;
}

/// Expression engine used for `condition` selectors
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    async fn evaluate(&self, ctx: &ExecutionContext, expression: &str) -> Result<bool>;
}

/// Chains filters; a flow survives only if every filter keeps it
#[derive(Clone, Default)]
pub struct CompositeConditionFilter {
    filters: Vec<Arc<dyn ConditionFilter>>,
}

impl CompositeConditionFilter {
    pub fn new(filters: Vec<Arc<dyn ConditionFilter>>) -> Self {
        Self { filters }
    }

    /// HTTP selector, channel selector, then condition expressions
    pub fn standard(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self::new(vec![
            Arc::new(HttpSelectorConditionFilter::new()),
            Arc::new(ChannelSelectorConditionFilter),
            Arc::new(ExpressionConditionFilter::new(evaluator)),
        ])
    }

    pub fn with_filter(mut self, filter: Arc<dyn ConditionFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[async_trait]
impl ConditionFilter for CompositeConditionFilter {
    async fn filter(&self, ctx: &ExecutionContext, flow: Arc<Flow>) -> Result<Option<Arc<Flow>>> {
        let mut current = flow;
        for filter in &self.filters {
            match filter.filter(ctx, current).await? {
                Some(kept) => current = kept,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

/// Applies the HTTP selector (path operator and methods) in `Http` mode
///
/// Flows with neither an HTTP selector nor a legacy path always pass. A
/// legacy path is treated as a `STARTS_WITH` pattern.
#[derive(Debug, Default)]
pub struct HttpSelectorConditionFilter {
    matcher: PathMatcher,
}

impl HttpSelectorConditionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn accepts(&self, ctx: &ExecutionContext, flow: &Flow) -> bool {
        match flow.http_selector() {
            Some(Selector::Http {
                path,
                path_operator,
                methods,
            }) => {
                let method_ok = methods.is_empty()
                    || ctx.method.is_some_and(|method| methods.contains(&method));
                method_ok && self.matcher.matches(path, *path_operator, &ctx.path)
            }
            _ => match &flow.path {
                Some(path) => self.matcher.matches(path, Operator::StartsWith, &ctx.path),
                None => true,
            },
        }
    }
}

#[async_trait]
impl ConditionFilter for HttpSelectorConditionFilter {
    async fn filter(&self, ctx: &ExecutionContext, flow: Arc<Flow>) -> Result<Option<Arc<Flow>>> {
        if ctx.mode != ExecutionMode::Http || self.accepts(ctx, &flow) {
            return Ok(Some(flow));
        }
        debug!(
            "Flow '{}' skipped: HTTP selector does not match {:?} {}",
            flow.display_name(),
            ctx.method,
            ctx.path
        );
        Ok(None)
    }
}

/// Applies the channel selector in `Message` mode
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelSelectorConditionFilter;

impl ChannelSelectorConditionFilter {
    fn accepts(ctx: &ExecutionContext, flow: &Flow) -> bool {
        match flow.channel_selector() {
            Some(Selector::Channel {
                channel,
                channel_operator,
            }) => match ctx.channel.as_deref() {
                Some(requested) => match channel_operator {
                    Operator::Equals => requested == channel,
                    Operator::StartsWith => requested.starts_with(channel.as_str()),
                },
                None => false,
            },
            _ => true,
        }
    }
}

#[async_trait]
impl ConditionFilter for ChannelSelectorConditionFilter {
    async fn filter(&self, ctx: &ExecutionContext, flow: Arc<Flow>) -> Result<Option<Arc<Flow>>> {
        if ctx.mode != ExecutionMode::Message || Self::accepts(ctx, &flow) {
            return Ok(Some(flow));
        }
        debug!(
            "Flow '{}' skipped: channel selector does not match {:?}",
            flow.display_name(),
            ctx.channel
        );
        Ok(None)
    }
}

/// Evaluates every `condition` selector of a flow; all must be true
#[derive(Clone)]
pub struct ExpressionConditionFilter {
    evaluator: Arc<dyn ConditionEvaluator>,
}

impl ExpressionConditionFilter {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl ConditionFilter for ExpressionConditionFilter {
    async fn filter(&self, ctx: &ExecutionContext, flow: Arc<Flow>) -> Result<Option<Arc<Flow>>> {
        for condition in flow.condition_selectors() {
            if !self.evaluator.evaluate(ctx, condition).await? {
                debug!(
                    "Flow '{}' skipped: condition '{}' is false",
                    flow.display_name(),
                    condition
                );
                return Ok(None);
            }
        }
        Ok(Some(flow))
    }
}

/// Evaluator for deployments without an expression engine
///
/// Understands the literals `true` and `false`, optionally wrapped as
/// `{#true}`. Anything else is an evaluation error.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralConditionEvaluator;

#[async_trait]
impl ConditionEvaluator for LiteralConditionEvaluator {
    async fn evaluate(&self, _ctx: &ExecutionContext, expression: &str) -> Result<bool> {
        let trimmed = expression.trim();
        let literal = trimmed
            .strip_prefix("{#")
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(trimmed)
            .trim();

        match literal {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(Error::ConditionEvaluation(format!(
                "unsupported expression '{}'",
                other
            ))),
        }
    }
}
