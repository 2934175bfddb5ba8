//! Queue pool configuration.
//!
//! Configuration comes from TOML text or a TOML file, with optional
//! environment overrides:
//!
//! - `QPOOL_QUEUES_PER_POOL`: slots per (device, priority class) pool
//! - `QPOOL_MAX_DEVICES`: cap on the number of devices treated as known

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::device::DeviceIndex;
use crate::error::ConfigError;

/// Environment variable overriding [`QueuePoolConfig::queues_per_pool`].
pub const ENV_QUEUES_PER_POOL: &str = "QPOOL_QUEUES_PER_POOL";

/// Environment variable overriding [`QueuePoolConfig::max_devices`].
pub const ENV_MAX_DEVICES: &str = "QPOOL_MAX_DEVICES";

/// Largest accepted pool capacity.
pub const MAX_QUEUES_PER_POOL: usize = 1024;

/// Queue pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePoolConfig {
    /// Number of queues in each (device, priority class) pool
    #[serde(default = "default_queues_per_pool")]
    pub queues_per_pool: usize,

    /// Only the first `max_devices` devices reported by the runtime are known
    #[serde(default)]
    pub max_devices: Option<DeviceIndex>,
}

fn default_queues_per_pool() -> usize {
    32
}

impl Default for QueuePoolConfig {
    fn default() -> Self {
        Self {
            queues_per_pool: default_queues_per_pool(),
            max_devices: None,
        }
    }
}

impl QueuePoolConfig {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading queue pool configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs and re-validate.
    ///
    /// Unrelated names are ignored.
    pub fn with_overrides<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                ENV_QUEUES_PER_POOL => {
                    self.queues_per_pool = value.parse().map_err(|_| {
                        ConfigError::ParseFailed(format!("{ENV_QUEUES_PER_POOL}={value}"))
                    })?;
                }
                ENV_MAX_DEVICES => {
                    self.max_devices = Some(value.parse().map_err(|_| {
                        ConfigError::ParseFailed(format!("{ENV_MAX_DEVICES}={value}"))
                    })?);
                }
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queues_per_pool == 0 || self.queues_per_pool > MAX_QUEUES_PER_POOL {
            return Err(ConfigError::Invalid(format!(
                "queues_per_pool must be in 1..={MAX_QUEUES_PER_POOL}, got {}",
                self.queues_per_pool
            )));
        }
        if let Some(max) = self.max_devices {
            if max < 0 {
                return Err(ConfigError::Invalid(format!(
                    "max_devices must not be negative, got {max}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = QueuePoolConfig::default();
        assert_eq!(config.queues_per_pool, 32);
        assert_eq!(config.max_devices, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = QueuePoolConfig::from_toml_str("queues_per_pool = 8\nmax_devices = 1\n").unwrap();
        assert_eq!(config.queues_per_pool, 8);
        assert_eq!(config.max_devices, Some(1));

        let config = QueuePoolConfig::from_toml_str("").unwrap();
        assert_eq!(config, QueuePoolConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            QueuePoolConfig::from_toml_str("queues_per_pool = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            QueuePoolConfig::from_toml_str("queues_per_pool = 4096"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            QueuePoolConfig::from_toml_str("max_devices = -2"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            QueuePoolConfig::from_toml_str("queues_per_pool = \"many\""),
            Err(ConfigError::ParseFailed(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = QueuePoolConfig::default()
            .with_overrides([
                (ENV_QUEUES_PER_POOL, "4"),
                (ENV_MAX_DEVICES, " 2 "),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.queues_per_pool, 4);
        assert_eq!(config.max_devices, Some(2));

        assert!(QueuePoolConfig::default()
            .with_overrides([(ENV_QUEUES_PER_POOL, "x")])
            .is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "queues_per_pool = 16").unwrap();

        let config = QueuePoolConfig::from_file(file.path()).unwrap();
        assert_eq!(config.queues_per_pool, 16);

        assert!(matches!(
            QueuePoolConfig::from_file("/nonexistent/qpool.toml"),
            Err(ConfigError::LoadFailed(_))
        ));
    }
}
