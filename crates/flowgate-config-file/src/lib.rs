//! File-based gateway configuration for Flowgate
//!
//! Loads the deployed APIs (flows, plans, endpoint groups) plus logging
//! settings from a single YAML or TOML file, and validates them before they
//! reach the routing engine.
//!
//! # Example
//! ```no_run
//! # use flowgate_config_file::GatewayConfig;
//! # fn example() -> flowgate_core::Result<()> {
//! let config = GatewayConfig::from_file("~/.flowgate/gateway.yaml")?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod file_store;
mod validation;

pub use config::{GatewayConfig, LogFormat, LoggingConfig};
pub use file_store::expand_path;
