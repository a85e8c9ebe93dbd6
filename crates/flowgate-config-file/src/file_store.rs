//! Reading configuration files from disk

use crate::config::GatewayConfig;
use flowgate_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Expand a leading `~` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?
            .join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("toml")
}

pub(crate) fn load(path: &Path) -> Result<GatewayConfig> {
    let path = expand_path(path)?;
    if !path.exists() {
        error!("Config file {:?} does not exist", path);
        return Err(Error::ConfigNotFound);
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        error!("Failed to read config file: {}", e);
        Error::Io(e)
    })?;

    let config = if is_toml(&path) {
        GatewayConfig::from_toml_str(&contents)
    } else {
        // Default to YAML
        GatewayConfig::from_yaml_str(&contents)
    }
    .inspect_err(|e| error!("Failed to parse config file {:?}: {}", path, e))?;

    debug!("Successfully read config file");
    info!("Loaded {} APIs from {:?}", config.apis.len(), path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_without_tilde() {
        let path = Path::new("/etc/flowgate/gateway.yaml");
        assert_eq!(expand_path(path).unwrap(), path);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let expanded = expand_path(Path::new("~/.flowgate/gateway.yaml")).unwrap();
        assert_eq!(expanded, home.join(".flowgate/gateway.yaml"));
    }

    #[test]
    fn test_toml_detection() {
        assert!(is_toml(Path::new("gateway.toml")));
        assert!(!is_toml(Path::new("gateway.yaml")));
        assert!(!is_toml(Path::new("gateway")));
    }
}
