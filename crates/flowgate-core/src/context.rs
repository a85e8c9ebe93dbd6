//! Per-request execution context consumed by flow resolution

use crate::flow::HttpMethod;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which request model the current call follows
///
/// Only the selector kind matching the active mode is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Synchronous request/response (HTTP selectors apply)
    Http,
    /// Streaming/message-based (channel selectors apply)
    Message,
}

/// Read-only view of the inbound call used to pick flows
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub mode: ExecutionMode,
    /// Request path, relative to the API context path
    pub path: String,
    pub method: Option<HttpMethod>,
    /// Channel name for message-style requests
    pub channel: Option<String>,
    /// Plan the caller subscribed through, if any
    pub plan_id: Option<String>,
    pub headers: HashMap<String, String>,
    /// Free-form attributes readable by condition evaluators
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    /// Context for a synchronous HTTP request
    pub fn http(path: impl Into<String>) -> Self {
        Self {
            mode: ExecutionMode::Http,
            path: path.into(),
            method: None,
            channel: None,
            plan_id: None,
            headers: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    /// Context for a message/streaming request on `channel`
    pub fn message(channel: impl Into<String>) -> Self {
        Self {
            mode: ExecutionMode::Message,
            path: "/".to_string(),
            method: None,
            channel: Some(channel.into()),
            plan_id: None,
            headers: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_plan(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let ctx = ExecutionContext::http("/orders/42")
            .with_method(HttpMethod::Get)
            .with_plan("gold")
            .with_header("X-Tier", "gold")
            .with_attribute("user", serde_json::json!("alice"));

        assert_eq!(ctx.mode, ExecutionMode::Http);
        assert_eq!(ctx.path, "/orders/42");
        assert_eq!(ctx.method, Some(HttpMethod::Get));
        assert_eq!(ctx.plan_id.as_deref(), Some("gold"));
        assert_eq!(ctx.headers.get("X-Tier"), Some(&"gold".to_string()));
        assert_eq!(ctx.attribute("user"), Some(&serde_json::json!("alice")));
    }

    #[test]
    fn test_message_context() {
        let ctx = ExecutionContext::message("orders.created");
        assert_eq!(ctx.mode, ExecutionMode::Message);
        assert_eq!(ctx.channel.as_deref(), Some("orders.created"));
        assert!(ctx.method.is_none());
    }
}
