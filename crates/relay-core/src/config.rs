use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffConfig;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    pub backoff: BackoffConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// Pending requests the hub loop accepts before senders wait.
    pub mailbox_capacity: usize,
    /// Outbound events buffered per connection before it counts as saturated.
    pub connection_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            connection_buffer: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: String::from("info"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub coordinator: CoordinatorConfig,
    pub hub: HubConfig,
    pub log: LogConfig,
}

impl RelayConfig {
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML, contains unknown
    /// keys, or holds out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(CoreError::ConfigParse)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// # Errors
    ///
    /// Returns an error naming the first out-of-range value.
    pub fn validate(&self) -> Result<()> {
        if self.hub.mailbox_capacity == 0 {
            return Err(CoreError::InvalidConfig {
                field: "hub.mailbox_capacity",
                reason: "must be at least 1",
            });
        }
        if self.hub.connection_buffer == 0 {
            return Err(CoreError::InvalidConfig {
                field: "hub.connection_buffer",
                reason: "must be at least 1",
            });
        }
        let backoff = &self.coordinator.backoff;
        if backoff.max_delay() < backoff.min_delay() {
            return Err(CoreError::InvalidConfig {
                field: "coordinator.backoff.max_delay_ms",
                reason: "must not be below min_delay_ms",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() -> anyhow::Result<()> {
        let config = RelayConfig::from_toml_str("")?;

        assert_eq!(config, RelayConfig::default());
        assert_eq!(
            config.coordinator.backoff.max_delay(),
            Duration::from_millis(1600)
        );
        assert_eq!(config.log.filter, "info");
        Ok(())
    }

    #[test]
    fn partial_sections_keep_other_defaults() -> anyhow::Result<()> {
        let config = RelayConfig::from_toml_str(
            r"
[coordinator.backoff]
increment_ms = 50

[hub]
connection_buffer = 8
",
        )?;

        assert_eq!(
            config.coordinator.backoff.increment(),
            Duration::from_millis(50)
        );
        assert_eq!(
            config.coordinator.backoff.max_delay(),
            Duration::from_millis(1600)
        );
        assert_eq!(config.hub.connection_buffer, 8);
        assert_eq!(config.hub.mailbox_capacity, 256);
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = RelayConfig::from_toml_str("[hub]\nfanout = 3\n");

        assert!(matches!(result, Err(CoreError::ConfigParse(_))));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let result = RelayConfig::from_toml_str("[hub]\nconnection_buffer = 0\n");

        assert!(matches!(
            result,
            Err(CoreError::InvalidConfig {
                field: "hub.connection_buffer",
                ..
            })
        ));
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let result = RelayConfig::from_toml_str(
            "[coordinator.backoff]\nmin_delay_ms = 500\nmax_delay_ms = 100\n",
        );

        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }
}
