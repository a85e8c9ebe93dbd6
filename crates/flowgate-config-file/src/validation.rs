//! Semantic checks on a parsed configuration

use crate::config::GatewayConfig;
use flowgate_core::{ApiDefinition, Flow, Selector, SelectorKind};
use flowgate_routing::validate_weights;
use std::collections::HashSet;

/// Every problem found, in declaration order
pub(crate) fn problems(config: &GatewayConfig) -> Vec<String> {
    let mut problems = Vec::new();
    let mut api_ids = HashSet::new();

    for api in &config.apis {
        if api.id.trim().is_empty() {
            problems.push("API id cannot be empty".to_string());
        } else if !api_ids.insert(api.id.as_str()) {
            problems.push(format!("Duplicate API id '{}'", api.id));
        }
        check_api(api, &mut problems);
    }

    problems
}

fn check_api(api: &ApiDefinition, problems: &mut Vec<String>) {
    for (index, flow) in api.flows.iter().enumerate() {
        check_flow(&api.id, &format!("flow #{}", index), flow, problems);
    }

    let mut plan_ids = HashSet::new();
    for plan in &api.plans {
        if !plan_ids.insert(plan.id.as_str()) {
            problems.push(format!("API '{}': duplicate plan id '{}'", api.id, plan.id));
        }
        for (index, flow) in plan.flows.iter().enumerate() {
            let location = format!("plan '{}' flow #{}", plan.id, index);
            check_flow(&api.id, &location, flow, problems);
        }
    }

    let mut group_names = HashSet::new();
    let mut endpoint_names = HashSet::new();
    for group in &api.endpoint_groups {
        if !group_names.insert(group.name.as_str()) {
            problems.push(format!(
                "API '{}': duplicate endpoint group '{}'",
                api.id, group.name
            ));
        }
        for endpoint in &group.endpoints {
            if !endpoint_names.insert(endpoint.name.as_str()) {
                problems.push(format!(
                    "API '{}': duplicate endpoint name '{}'",
                    api.id, endpoint.name
                ));
            }
        }
        if group.load_balancer.is_weighted() {
            if let Err(e) = validate_weights(group.endpoints.iter().map(|e| e.weight)) {
                problems.push(format!(
                    "API '{}': endpoint group '{}': {}",
                    api.id, group.name, e
                ));
            }
        }
    }
}

fn check_flow(api_id: &str, location: &str, flow: &Flow, problems: &mut Vec<String>) {
    let name = flow.name.as_deref().unwrap_or(location);

    for kind in [SelectorKind::Http, SelectorKind::Channel] {
        let count = flow.selectors.iter().filter(|s| s.kind() == kind).count();
        if count > 1 {
            problems.push(format!(
                "API '{}': flow '{}' declares {} {:?} selectors, at most one is allowed",
                api_id, name, count, kind
            ));
        }
    }

    for selector in &flow.selectors {
        match selector {
            Selector::Http { path, .. } if !path.starts_with('/') => problems.push(format!(
                "API '{}': flow '{}' has HTTP path '{}' not starting with '/'",
                api_id, name, path
            )),
            Selector::Channel { channel, .. } if channel.is_empty() => problems.push(format!(
                "API '{}': flow '{}' has an empty channel",
                api_id, name
            )),
            Selector::Condition { condition } if condition.trim().is_empty() => {
                problems.push(format!(
                    "API '{}': flow '{}' has an empty condition",
                    api_id, name
                ))
            }
            _ => {}
        }
    }

    if let Some(path) = &flow.path {
        if !path.starts_with('/') {
            problems.push(format!(
                "API '{}': flow '{}' has path '{}' not starting with '/'",
                api_id, name, path
            ));
        }
    }
}
