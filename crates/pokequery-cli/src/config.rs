//! pokequery CLI Configuration Management
//!
//! Configuration is read from a TOML file when `--config` is given and falls
//! back to defaults otherwise. Missing sections and keys take their default
//! values. Command line flags override whatever the file says.

use std::path::{Path, PathBuf};

use pokequery_core::{ClientConfig, ServerConfig};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the pokequery binary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

/// Logging options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides for `serve`
    pub fn with_serve_overrides(mut self, dataset: Option<PathBuf>, listen: Option<String>) -> Self {
        if let Some(dataset) = dataset {
            self.server = self.server.with_dataset(dataset);
        }
        if let Some(listen) = listen {
            self.server = self.server.with_listen_addr(listen);
        }
        self
    }

    /// Apply command line overrides for `client`
    pub fn with_client_overrides(mut self, server: Option<String>) -> Self {
        if let Some(server) = server {
            self.client = self.client.with_server_addr(server);
        }
        self
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.client.validate()?;
        self.log_level()?;
        Ok(())
    }

    /// Parsed logging level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging.level.parse().map_err(|_| {
            CliError::Config(format!("Unknown logging level: {}", self.logging.level))
        })
    }

    /// Create example configuration file content
    pub fn example_config() -> Result<String> {
        let example = AppConfig {
            server: ServerConfig::default().with_dataset("pokemon.csv"),
            ..Default::default()
        };
        Ok(toml::to_string_pretty(&example)?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_level().unwrap(), tracing::Level::INFO);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[client]\nserver_addr = \"10.0.0.5:6000\"").unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.client.server_addr, "10.0.0.5:6000");
        assert_eq!(config.client.codec.record_separator, '|');
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server.codec]\nfield_separator = \"|\"").unwrap();
        assert!(AppConfig::load_from_file(file.path()).is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let err = AppConfig::load_from_file("/nonexistent/pokequery.toml").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let config = AppConfig::default()
            .with_serve_overrides(Some(PathBuf::from("other.csv")), Some("0.0.0.0:7000".into()))
            .with_client_overrides(Some("example.org:7000".into()));
        assert_eq!(config.server.dataset_path, Some(PathBuf::from("other.csv")));
        assert_eq!(config.server.listen_addr, "0.0.0.0:7000");
        assert_eq!(config.client.server_addr, "example.org:7000");
    }

    #[test]
    fn test_example_config_round_trips() {
        let example = AppConfig::example_config().unwrap();
        assert!(example.contains("[server]"));
        assert!(example.contains("[client]"));
        assert!(example.contains("[logging]"));

        let parsed: AppConfig = toml::from_str(&example).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.server.dataset_path, Some(PathBuf::from("pokemon.csv")));
    }
}
