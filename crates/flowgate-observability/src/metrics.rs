//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for Flowgate:
//! - Flow resolution counts and latency by API and outcome
//! - Endpoint selections by group and endpoint
//! - Selection misses (no available endpoint) by group
//! - Endpoint pool sizes

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome of one flow resolution, used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// At least one flow was resolved
    Matched,
    /// Resolution succeeded with no applicable flow
    Empty,
    /// Resolution failed (provider or condition evaluation fault)
    Error,
}

impl ResolutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

/// Metrics collector for Flowgate
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    // Flow resolution
    /// Resolutions by API and outcome
    pub flow_resolutions_total: CounterVec,
    /// Resolution duration by API
    pub flow_resolution_duration_seconds: HistogramVec,
    /// Flows handed to the policy chain by API
    pub flows_resolved_total: CounterVec,

    // Load balancing
    /// Endpoint selections by group and endpoint
    pub endpoint_selections_total: CounterVec,
    /// Selections that found no available endpoint
    pub endpoint_selection_misses_total: CounterVec,
    /// Current number of endpoints in each group
    pub endpoint_pool_size: GaugeVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let flow_resolutions_total = CounterVec::new(
            Opts::new(
                "flowgate_flow_resolutions_total",
                "Total number of flow resolutions",
            ),
            &["api", "outcome"],
        )?;

        // Resolution is expected well under a millisecond
        let flow_resolution_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "flowgate_flow_resolution_duration_seconds",
                "Flow resolution duration in seconds",
            )
            .buckets(vec![
                0.000_01, 0.000_05, 0.000_1, 0.000_25, 0.000_5, 0.001, 0.005, 0.01, 0.05,
            ]),
            &["api"],
        )?;

        let flows_resolved_total = CounterVec::new(
            Opts::new(
                "flowgate_flows_resolved_total",
                "Total number of flows selected for execution",
            ),
            &["api"],
        )?;

        let endpoint_selections_total = CounterVec::new(
            Opts::new(
                "flowgate_endpoint_selections_total",
                "Total number of endpoint selections",
            ),
            &["group", "endpoint"],
        )?;

        let endpoint_selection_misses_total = CounterVec::new(
            Opts::new(
                "flowgate_endpoint_selection_misses_total",
                "Total number of selections with no available endpoint",
            ),
            &["group"],
        )?;

        let endpoint_pool_size = GaugeVec::new(
            Opts::new(
                "flowgate_endpoint_pool_size",
                "Number of endpoints in the group",
            ),
            &["group"],
        )?;

        registry.register(Box::new(flow_resolutions_total.clone()))?;
        registry.register(Box::new(flow_resolution_duration_seconds.clone()))?;
        registry.register(Box::new(flows_resolved_total.clone()))?;
        registry.register(Box::new(endpoint_selections_total.clone()))?;
        registry.register(Box::new(endpoint_selection_misses_total.clone()))?;
        registry.register(Box::new(endpoint_pool_size.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            flow_resolutions_total,
            flow_resolution_duration_seconds,
            flows_resolved_total,
            endpoint_selections_total,
            endpoint_selection_misses_total,
            endpoint_pool_size,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one flow resolution
    pub fn record_resolution(
        &self,
        api: &str,
        outcome: ResolutionOutcome,
        flow_count: usize,
        duration_secs: f64,
    ) {
        self.flow_resolutions_total
            .with_label_values(&[api, outcome.as_str()])
            .inc();
        self.flow_resolution_duration_seconds
            .with_label_values(&[api])
            .observe(duration_secs);
        if flow_count > 0 {
            self.flows_resolved_total
                .with_label_values(&[api])
                .inc_by(flow_count as f64);
        }
    }

    /// Record a successful endpoint selection
    pub fn record_endpoint_selection(&self, group: &str, endpoint: &str) {
        self.endpoint_selections_total
            .with_label_values(&[group, endpoint])
            .inc();
    }

    /// Record a selection that found no available endpoint
    pub fn record_selection_miss(&self, group: &str) {
        self.endpoint_selection_misses_total
            .with_label_values(&[group])
            .inc();
    }

    /// Update the pool size gauge of a group
    pub fn set_pool_size(&self, group: &str, size: usize) {
        self.endpoint_pool_size
            .with_label_values(&[group])
            .set(size as f64);
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
