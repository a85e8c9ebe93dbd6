//! Gateway configuration model

use flowgate_core::{ApiDefinition, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. "info" or "flowgate_routing=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Complete gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub apis: Vec<ApiDefinition>,
}

impl GatewayConfig {
    /// Load from a file; `.toml` files are read as TOML, anything else as YAML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        crate::file_store::load(path.as_ref())
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| Error::Config(format!("Invalid YAML: {}", e)))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply environment overrides (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("FLOWGATE_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("FLOWGATE_LOG_FORMAT") {
            match val.to_lowercase().as_str() {
                "text" => self.logging.format = LogFormat::Text,
                "json" => self.logging.format = LogFormat::Json,
                _ => warn!("Invalid FLOWGATE_LOG_FORMAT '{}', keeping {:?}", val, self.logging.format),
            }
        }
    }

    pub fn api(&self, id: &str) -> Option<&ApiDefinition> {
        self.apis.iter().find(|api| api.id == id)
    }

    /// Check the whole configuration, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let problems = crate::validation::problems(self);
        if problems.is_empty() {
            return Ok(());
        }
        for problem in &problems {
            warn!("Invalid configuration: {}", problem);
        }
        Err(Error::ConfigValidation(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_core::{FlowMode, LoadBalancerType, Selector};
    use serial_test::serial;

    const YAML: &str = r#"
logging:
  level: debug
  format: json
apis:
  - id: orders
    flow_mode: BEST_MATCH
    flows:
      - name: list
        selectors:
          - type: http
            path: /orders
            methods: [GET]
        pre:
          - policy: cache
            configuration:
              ttl: 30
    endpoint_groups:
      - name: default
        load_balancer: WEIGHTED_RANDOM
        endpoints:
          - name: a
            target: http://a:8080
            weight: 9
          - name: b
            target: http://b:8080
"#;

    const TOML: &str = r#"
[logging]
level = "warn"

[[apis]]
id = "orders"

[[apis.flows]]
name = "list"

[[apis.flows.selectors]]
type = "http"
path = "/orders"
path_operator = "EQUALS"

[[apis.flows.pre]]
policy = "cache"

[[apis.endpoint_groups]]
name = "default"

[[apis.endpoint_groups.endpoints]]
name = "a"
target = "http://a:8080"
"#;

    #[test]
    fn test_from_yaml_str() {
        let config = GatewayConfig::from_yaml_str(YAML).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);

        let api = config.api("orders").unwrap();
        assert_eq!(api.flow_mode, FlowMode::BestMatch);
        assert_eq!(api.flows[0].pre[0].configuration["ttl"], 30);
        assert_eq!(
            api.endpoint_groups[0].load_balancer,
            LoadBalancerType::WeightedRandom
        );
        assert_eq!(api.endpoint_groups[0].endpoints[1].weight, 1);
        assert!(config.api("missing").is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_from_toml_str() {
        let config = GatewayConfig::from_toml_str(TOML).unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Text);
        let api = config.api("orders").unwrap();
        assert!(matches!(
            &api.flows[0].selectors[0],
            Selector::Http { path, .. } if path == "/orders"
        ));
        assert_eq!(api.endpoint_groups[0].load_balancer, LoadBalancerType::RoundRobin);
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_yaml_str("apis: []").unwrap();
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.apis.is_empty());
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = GatewayConfig::from_yaml_str("apis: [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = GatewayConfig::from_toml_str("apis = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    #[serial]
    fn test_merge_env() {
        let mut config = GatewayConfig::default();
        unsafe {
            std::env::set_var("FLOWGATE_LOG_LEVEL", "trace");
            std::env::set_var("FLOWGATE_LOG_FORMAT", "JSON");
        }
        config.merge_env();
        unsafe {
            std::env::remove_var("FLOWGATE_LOG_LEVEL");
            std::env::remove_var("FLOWGATE_LOG_FORMAT");
        }

        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_merge_env_ignores_unknown_format() {
        let mut config = GatewayConfig::default();
        unsafe {
            std::env::set_var("FLOWGATE_LOG_FORMAT", "xml");
        }
        config.merge_env();
        unsafe {
            std::env::remove_var("FLOWGATE_LOG_FORMAT");
        }

        assert_eq!(config.logging.format, LogFormat::Text);
    }
}
