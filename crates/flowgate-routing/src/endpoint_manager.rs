//! Endpoint groups and their lifecycle
//!
//! An [`EndpointGroup`] owns a pool of endpoints and the load balancer that
//! picks from it. The [`EndpointManager`] holds an API's groups, applies pool
//! changes (each followed by a balancer refresh before the call returns) and
//! notifies listeners about them.

use crate::load_balancer::{
    LoadBalancer, RandomSource, ThreadRandom, build_load_balancer_with, lock,
};
use flowgate_core::{
    Endpoint, EndpointConfig, EndpointGroupConfig, Error, LoadBalancerType, Result,
};
use flowgate_observability::Metrics;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Pool membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointEvent {
    Added,
    Removed,
}

/// Called with every pool change, after the balancer was refreshed
///
/// Listeners run outside every manager lock and may call back into the manager.
pub type EndpointListener = Arc<dyn Fn(EndpointEvent, &Arc<Endpoint>) + Send + Sync>;

/// Narrows endpoint selection
///
/// A name is looked up as an endpoint name first, then as a group name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointCriteria {
    pub name: Option<String>,
}

impl EndpointCriteria {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// A balanced pool of endpoints
pub struct EndpointGroup {
    name: String,
    kind: LoadBalancerType,
    endpoints: RwLock<Vec<Arc<Endpoint>>>,
    balancer: Arc<dyn LoadBalancer>,
}

impl EndpointGroup {
    pub fn new(name: impl Into<String>, kind: LoadBalancerType, endpoints: Vec<Arc<Endpoint>>) -> Self {
        Self::with_random(name, kind, endpoints, Arc::new(ThreadRandom))
    }

    pub fn with_random(
        name: impl Into<String>,
        kind: LoadBalancerType,
        endpoints: Vec<Arc<Endpoint>>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let balancer = build_load_balancer_with(kind, &endpoints, random);
        Self {
            name: name.into(),
            kind,
            endpoints: RwLock::new(endpoints),
            balancer,
        }
    }

    pub fn from_config(config: &EndpointGroupConfig) -> Self {
        let endpoints = config
            .endpoints
            .iter()
            .map(|endpoint| Arc::new(endpoint.to_endpoint()))
            .collect();
        Self::new(&config.name, config.load_balancer, endpoints)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LoadBalancerType {
        self.kind
    }

    /// Current pool, in insertion order
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn endpoint(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.endpoints
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|e| e.name() == name)
            .cloned()
    }

    /// Balanced pick from this group
    pub fn next(&self) -> Option<Arc<Endpoint>> {
        self.balancer.next()
    }

    fn add(&self, endpoint: Arc<Endpoint>) {
        let mut endpoints = self
            .endpoints
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        endpoints.push(endpoint);
        self.balancer.refresh(&endpoints);
    }

    fn remove(&self, name: &str) -> Option<Arc<Endpoint>> {
        let mut endpoints = self
            .endpoints
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let index = endpoints.iter().position(|e| e.name() == name)?;
        let removed = endpoints.remove(index);
        self.balancer.refresh(&endpoints);
        Some(removed)
    }
}

/// Endpoint groups of one API
pub struct EndpointManager {
    groups: Vec<Arc<EndpointGroup>>,
    listeners: RwLock<Vec<EndpointListener>>,
    /// Held across every check-then-mutate sequence on the pools
    changes: Mutex<()>,
    metrics: Option<Arc<Metrics>>,
}

impl EndpointManager {
    pub fn new(groups: Vec<EndpointGroup>) -> Self {
        Self {
            groups: groups.into_iter().map(Arc::new).collect(),
            listeners: RwLock::new(Vec::new()),
            changes: Mutex::new(()),
            metrics: None,
        }
    }

    pub fn from_configs(configs: &[EndpointGroupConfig]) -> Self {
        let manager = Self::new(configs.iter().map(EndpointGroup::from_config).collect());
        for group in &manager.groups {
            info!(
                "Endpoint group '{}' ready with {} endpoints ({})",
                group.name(),
                group.len(),
                group.kind().as_str()
            );
        }
        manager
    }

    /// Attach metrics; publishes the current pool sizes
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        for group in &self.groups {
            metrics.set_pool_size(group.name(), group.len());
        }
        self.metrics = Some(metrics);
        self
    }

    pub fn groups(&self) -> &[Arc<EndpointGroup>] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<Arc<EndpointGroup>> {
        self.groups.iter().find(|g| g.name() == name).cloned()
    }

    pub fn endpoint(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.groups.iter().find_map(|g| g.endpoint(name))
    }

    fn group_of(&self, endpoint: &str) -> Option<&Arc<EndpointGroup>> {
        self.groups.iter().find(|g| g.endpoint(endpoint).is_some())
    }

    /// Balanced pick from the first group
    pub fn next(&self) -> Option<Arc<Endpoint>> {
        let group = self.groups.first()?;
        let picked = group.next();
        self.record(group.name(), picked.as_ref());
        picked
    }

    /// Pick constrained by `criteria`; `None` for an unknown name
    pub fn next_for(&self, criteria: &EndpointCriteria) -> Option<Arc<Endpoint>> {
        let Some(name) = criteria.name.as_deref() else {
            return self.next();
        };

        if let Some(group) = self.group_of(name) {
            let picked = group.endpoint(name).filter(|e| e.is_available());
            self.record(group.name(), picked.as_ref());
            return picked;
        }

        if let Some(group) = self.group(name) {
            let picked = group.next();
            self.record(group.name(), picked.as_ref());
            return picked;
        }

        debug!("No endpoint or group named '{}'", name);
        None
    }

    fn record(&self, group: &str, picked: Option<&Arc<Endpoint>>) {
        match picked {
            Some(endpoint) => {
                debug!("Selected endpoint '{}' from group '{}'", endpoint.name(), group);
                if let Some(metrics) = &self.metrics {
                    metrics.record_endpoint_selection(group, endpoint.name());
                }
            }
            None => {
                warn!("No available endpoint in group '{}'", group);
                if let Some(metrics) = &self.metrics {
                    metrics.record_selection_miss(group);
                }
            }
        }
    }

    /// Add an endpoint to `group`; the balancer sees it once this returns
    ///
    /// Endpoint names are unique across every group of the manager.
    pub fn add_endpoint(&self, group: &str, config: &EndpointConfig) -> Result<Arc<Endpoint>> {
        let target = self
            .group(group)
            .ok_or_else(|| Error::UnknownEndpointGroup(group.to_string()))?;

        let endpoint = {
            let _changes = lock(&self.changes);
            self.insert(&target, config)?
        };

        self.pool_changed(&target, EndpointEvent::Added, &endpoint);
        Ok(endpoint)
    }

    /// Remove an endpoint by name; the balancer no longer returns it once this returns
    pub fn remove_endpoint(&self, name: &str) -> Option<Arc<Endpoint>> {
        let (group, removed) = {
            let _changes = lock(&self.changes);
            self.take(name)?
        };

        self.pool_changed(&group, EndpointEvent::Removed, &removed);
        Some(removed)
    }

    /// Replace an endpoint's configuration, keeping its group
    ///
    /// Removal and re-insertion happen under one lock, so no concurrent
    /// change can claim the name in between.
    pub fn update_endpoint(&self, config: &EndpointConfig) -> Result<Arc<Endpoint>> {
        let (group, removed, added) = {
            let _changes = lock(&self.changes);
            let (group, removed) = self
                .take(&config.name)
                .ok_or_else(|| Error::UnknownEndpoint(config.name.clone()))?;
            let added = self.insert(&group, config)?;
            (group, removed, added)
        };

        self.pool_changed(&group, EndpointEvent::Removed, &removed);
        self.pool_changed(&group, EndpointEvent::Added, &added);
        Ok(added)
    }

    // Callers hold `changes`
    fn insert(&self, group: &EndpointGroup, config: &EndpointConfig) -> Result<Arc<Endpoint>> {
        if self.endpoint(&config.name).is_some() {
            return Err(Error::DuplicateEndpoint(config.name.clone()));
        }

        let endpoint = Arc::new(config.to_endpoint());
        group.add(Arc::clone(&endpoint));
        info!("Added endpoint '{}' to group '{}'", endpoint.name(), group.name());
        Ok(endpoint)
    }

    // Callers hold `changes`
    fn take(&self, name: &str) -> Option<(Arc<EndpointGroup>, Arc<Endpoint>)> {
        let group = self.group_of(name)?;
        let removed = group.remove(name)?;
        info!("Removed endpoint '{}' from group '{}'", name, group.name());
        Some((Arc::clone(group), removed))
    }

    fn pool_changed(&self, group: &EndpointGroup, event: EndpointEvent, endpoint: &Arc<Endpoint>) {
        if let Some(metrics) = &self.metrics {
            metrics.set_pool_size(group.name(), group.len());
        }

        let listeners: Vec<EndpointListener> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in &listeners {
            listener(event, endpoint);
        }
    }

    /// Mark an endpoint unavailable; returns false for an unknown name
    pub fn disable(&self, name: &str) -> bool {
        self.set_available(name, false)
    }

    /// Mark an endpoint available again; returns false for an unknown name
    pub fn enable(&self, name: &str) -> bool {
        self.set_available(name, true)
    }

    fn set_available(&self, name: &str, available: bool) -> bool {
        match self.endpoint(name) {
            Some(endpoint) => {
                if endpoint.set_available(available) != available {
                    info!(
                        "Endpoint '{}' is now {}",
                        name,
                        if available { "available" } else { "unavailable" }
                    );
                }
                true
            }
            None => false,
        }
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(EndpointEvent, &Arc<Endpoint>) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn group(name: &str, kind: LoadBalancerType, endpoints: &[(&str, u32)]) -> EndpointGroupConfig {
        EndpointGroupConfig {
            name: name.to_string(),
            load_balancer: kind,
            endpoints: endpoints
                .iter()
                .map(|(endpoint, weight)| {
                    EndpointConfig::new(*endpoint, format!("http://{}:8080", endpoint), *weight)
                })
                .collect(),
        }
    }

    fn manager() -> EndpointManager {
        EndpointManager::from_configs(&[
            group("primary", LoadBalancerType::RoundRobin, &[("a", 1), ("b", 1)]),
            group("backup", LoadBalancerType::RoundRobin, &[("c", 1)]),
        ])
    }

    #[test]
    fn test_next_uses_first_group() {
        let manager = manager();
        let picked: Vec<String> = (0..4)
            .filter_map(|_| manager.next())
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(picked, vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_next_without_groups() {
        let manager = EndpointManager::from_configs(&[]);
        assert!(manager.next().is_none());
    }

    #[test]
    fn test_next_by_endpoint_name() {
        let manager = manager();
        let picked = manager.next_for(&EndpointCriteria::by_name("b")).unwrap();
        assert_eq!(picked.name(), "b");
    }

    #[test]
    fn test_next_by_group_name() {
        let manager = manager();
        let picked = manager.next_for(&EndpointCriteria::by_name("backup")).unwrap();
        assert_eq!(picked.name(), "c");
    }

    #[test]
    fn test_next_by_unknown_name() {
        let manager = manager();
        assert!(manager.next_for(&EndpointCriteria::by_name("UNKNOWN")).is_none());
        assert!(manager.next_for(&EndpointCriteria::default()).is_some());
    }

    #[test]
    fn test_disabled_endpoint_not_returned_by_name_until_enabled() {
        let manager = manager();
        let criteria = EndpointCriteria::by_name("a");

        assert!(manager.disable("a"));
        assert!(manager.next_for(&criteria).is_none());
        for _ in 0..4 {
            assert_eq!(manager.next().unwrap().name(), "b");
        }

        assert!(manager.enable("a"));
        assert!(manager.next_for(&criteria).is_some());
        assert!(!manager.disable("missing"));
    }

    #[test]
    fn test_add_endpoint_notifies_and_is_selectable() {
        let manager = manager();
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        manager.add_listener(move |event, endpoint| {
            seen.lock().unwrap().push((event, endpoint.name().to_string()));
        });

        manager
            .add_endpoint("backup", &EndpointConfig::new("d", "http://d:8080", 1))
            .unwrap();

        assert_eq!(*events.lock().unwrap(), vec![(EndpointEvent::Added, "d".to_string())]);
        let group = manager.group("backup").unwrap();
        let picked: Vec<String> = (0..2)
            .filter_map(|_| group.next())
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(picked, vec!["c", "d"]);
    }

    #[test]
    fn test_add_endpoint_errors() {
        let manager = manager();
        assert!(matches!(
            manager.add_endpoint("nope", &EndpointConfig::new("x", "http://x", 1)),
            Err(Error::UnknownEndpointGroup(_))
        ));
        assert!(matches!(
            manager.add_endpoint("backup", &EndpointConfig::new("a", "http://a", 1)),
            Err(Error::DuplicateEndpoint(_))
        ));
    }

    #[test]
    fn test_remove_endpoint_mid_cycle() {
        let manager = EndpointManager::from_configs(&[group(
            "weighted",
            LoadBalancerType::WeightedRoundRobin,
            &[("a", 2), ("b", 2), ("c", 2)],
        )]);
        let removed_events = Arc::new(Mutex::new(Vec::new()));
        let seen = removed_events.clone();
        manager.add_listener(move |event, endpoint| {
            if event == EndpointEvent::Removed {
                seen.lock().unwrap().push(endpoint.name().to_string());
            }
        });

        manager.next();
        manager.next();
        assert_eq!(manager.remove_endpoint("b").unwrap().name(), "b");

        for _ in 0..20 {
            assert_ne!(manager.next().unwrap().name(), "b");
        }
        assert_eq!(*removed_events.lock().unwrap(), vec!["b".to_string()]);
        assert!(manager.remove_endpoint("b").is_none());
    }

    #[test]
    fn test_update_endpoint_emits_remove_then_add() {
        let manager = manager();
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        manager.add_listener(move |event, _| seen.lock().unwrap().push(event));

        let updated = manager
            .update_endpoint(&EndpointConfig::new("c", "http://c-new:8080", 5))
            .unwrap();

        assert_eq!(updated.target(), "http://c-new:8080");
        assert_eq!(updated.weight(), 5);
        assert_eq!(
            *events.lock().unwrap(),
            vec![EndpointEvent::Removed, EndpointEvent::Added]
        );
        assert_eq!(manager.group("backup").unwrap().len(), 1);
        assert_eq!(manager.endpoint("c").unwrap().target(), "http://c-new:8080");
    }

    #[test]
    fn test_update_unknown_endpoint() {
        let manager = manager();
        assert!(matches!(
            manager.update_endpoint(&EndpointConfig::new("zz", "http://zz", 1)),
            Err(Error::UnknownEndpoint(name)) if name == "zz"
        ));
        assert_eq!(manager.group("primary").unwrap().len(), 2);
        assert_eq!(manager.group("backup").unwrap().len(), 1);
    }

    #[test]
    fn test_listener_can_call_back_into_manager() {
        let manager = Arc::new(manager());
        let calls = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&manager);
        let counter = calls.clone();
        manager.add_listener(move |event, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(manager) = weak.upgrade() {
                let inner = counter.clone();
                manager.add_listener(move |_, _| {
                    inner.fetch_add(1, Ordering::SeqCst);
                });
                if event == EndpointEvent::Added {
                    manager.disable("a");
                }
            }
        });

        manager
            .add_endpoint("backup", &EndpointConfig::new("d", "http://d:8080", 1))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!manager.endpoint("a").unwrap().is_available());

        // The original listener plus the one it registered
        manager.remove_endpoint("d").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_metrics_track_selections_and_pool_size() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let manager = manager().with_metrics(metrics.clone());

        manager.next();
        manager.disable("c");
        manager.next_for(&EndpointCriteria::by_name("backup"));
        manager.remove_endpoint("b");

        assert_eq!(
            metrics
                .endpoint_selections_total
                .with_label_values(&["primary", "a"])
                .get(),
            1.0
        );
        assert_eq!(
            metrics
                .endpoint_selection_misses_total
                .with_label_values(&["backup"])
                .get(),
            1.0
        );
        assert_eq!(
            metrics
                .endpoint_pool_size
                .with_label_values(&["primary"])
                .get(),
            1.0
        );
    }

    #[test]
    fn test_disabled_config_starts_unavailable() {
        let mut configs = vec![group("g", LoadBalancerType::Random, &[("a", 1), ("b", 1)])];
        configs[0].endpoints[0].enabled = false;

        let manager = EndpointManager::from_configs(&configs);
        for _ in 0..10 {
            assert_eq!(manager.next().unwrap().name(), "b");
        }
    }
}
