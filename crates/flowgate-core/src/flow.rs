//! Flow and selector definitions
//!
//! A flow is an ordered set of pre/post policy steps plus the selectors that
//! decide when it applies to a request. Flows arrive already deserialized from
//! the deployment layer and are shared immutably (`Arc<Flow>`) once deployed.
//!
//! Selectors are a closed set of kinds:
//! - `http`: request path (and optionally method) matching
//! - `channel`: channel/topic matching for message-style APIs
//! - `condition`: free-form expression handed to the condition evaluator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Matching operator for path and channel selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    /// Whole path (or channel) must match
    Equals,
    /// Path (or channel) must begin with the pattern
    #[default]
    StartsWith,
}

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE" => Ok(HttpMethod::Trace),
            "CONNECT" => Ok(HttpMethod::Connect),
            other => Err(format!("unknown HTTP method '{}'", other)),
        }
    }
}

/// Discriminant of a [`Selector`], used for validation and lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    Http,
    Channel,
    Condition,
}

/// Pattern attached to a flow that decides whether it applies to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Selector {
    /// Match on request path and, optionally, method
    Http {
        path: String,
        #[serde(default)]
        path_operator: Operator,
        /// Empty means any method
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        methods: Vec<HttpMethod>,
    },
    /// Match on channel (topic, queue, ...) for message-style requests
    Channel {
        channel: String,
        #[serde(default)]
        channel_operator: Operator,
    },
    /// Free-form condition evaluated by the expression engine
    Condition { condition: String },
}

impl Selector {
    /// HTTP selector for `path` matching any method
    pub fn http(path: impl Into<String>, operator: Operator) -> Self {
        Selector::Http {
            path: path.into(),
            path_operator: operator,
            methods: Vec::new(),
        }
    }

    pub fn channel(channel: impl Into<String>, operator: Operator) -> Self {
        Selector::Channel {
            channel: channel.into(),
            channel_operator: operator,
        }
    }

    pub fn condition(condition: impl Into<String>) -> Self {
        Selector::Condition {
            condition: condition.into(),
        }
    }

    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::Http { .. } => SelectorKind::Http,
            Selector::Channel { .. } => SelectorKind::Channel,
            Selector::Condition { .. } => SelectorKind::Condition,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One policy invocation inside a flow phase. Contents are opaque to routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Policy identifier (e.g. "rate-limit", "transform-headers")
    pub policy: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Opaque policy configuration
    #[serde(default)]
    pub configuration: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Step {
    pub fn new(policy: impl Into<String>) -> Self {
        Self {
            name: None,
            description: None,
            policy: policy.into(),
            enabled: true,
            configuration: serde_json::Value::Null,
            condition: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_configuration(mut self, configuration: serde_json::Value) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A flow declared on an API or plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Legacy path pattern, used when no HTTP selector is declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub selectors: Vec<Selector>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub pre: Vec<Step>,
    #[serde(default)]
    pub post: Vec<Step>,
}

impl Flow {
    /// Create an enabled flow with no selectors and no steps
    pub fn new() -> Self {
        Self {
            name: None,
            path: None,
            selectors: Vec::new(),
            enabled: true,
            pre: Vec::new(),
            post: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn with_pre_step(mut self, step: Step) -> Self {
        self.pre.push(step);
        self
    }

    pub fn with_post_step(mut self, step: Step) -> Self {
        self.post.push(step);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Name for logging: declared name, else the scoring path
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.http_path())
    }

    pub fn selector(&self, kind: SelectorKind) -> Option<&Selector> {
        self.selectors.iter().find(|s| s.kind() == kind)
    }

    pub fn http_selector(&self) -> Option<&Selector> {
        self.selector(SelectorKind::Http)
    }

    pub fn channel_selector(&self) -> Option<&Selector> {
        self.selector(SelectorKind::Channel)
    }

    /// All condition expressions declared on this flow, in order
    pub fn condition_selectors(&self) -> impl Iterator<Item = &str> + '_ {
        self.selectors.iter().filter_map(|s| match s {
            Selector::Condition { condition } => Some(condition.as_str()),
            _ => None,
        })
    }

    /// Path pattern used for best-match scoring
    ///
    /// HTTP selector path first, then the legacy `path`, then `/`.
    pub fn http_path(&self) -> &str {
        match self.http_selector() {
            Some(Selector::Http { path, .. }) => path,
            _ => self.path.as_deref().unwrap_or("/"),
        }
    }

    pub fn channel(&self) -> Option<&str> {
        match self.channel_selector() {
            Some(Selector::Channel { channel, .. }) => Some(channel),
            _ => None,
        }
    }

    pub fn enabled_pre_steps(&self) -> impl Iterator<Item = &Step> + '_ {
        self.pre.iter().filter(|s| s.enabled)
    }

    pub fn enabled_post_steps(&self) -> impl Iterator<Item = &Step> + '_ {
        self.post.iter().filter(|s| s.enabled)
    }
}

impl Default for Flow {
    fn default() -> Self {
        Self::new()
    }
}
