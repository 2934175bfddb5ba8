//! CLI configuration.
//!
//! One TOML file configures both the pool and the simulated runtime:
//!
//! ```toml
//! [pool]
//! queues_per_pool = 16
//!
//! [simulated]
//! device_count = 4
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use qpool_core::{ConfigError, DeviceIndex, QueuePoolConfig, SimulatedConfig};

/// Configuration for a CLI run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Queue pool settings
    #[serde(default)]
    pub pool: QueuePoolConfig,

    /// Simulated runtime settings
    #[serde(default)]
    pub simulated: SimulatedConfig,
}

impl CliConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.pool.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides and the
    /// `--devices` flag.
    pub fn load(path: Option<&Path>, devices: Option<DeviceIndex>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => Self::default(),
        };
        config.pool = config.pool.with_env_overrides()?;
        if let Some(devices) = devices {
            config.simulated.device_count = devices;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_default_independently() {
        let config = CliConfig::from_toml_str("[simulated]\ndevice_count = 4\n").unwrap();
        assert_eq!(config.simulated.device_count, 4);
        assert_eq!(config.pool, QueuePoolConfig::default());
    }

    #[test]
    fn test_invalid_pool_section() {
        assert!(CliConfig::from_toml_str("[pool]\nqueues_per_pool = 0\n").is_err());
    }
}
