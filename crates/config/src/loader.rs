//! Configuration loading from multiple sources

use crate::{AppConfig, ConfigError, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Prefix for environment overrides, e.g. `DUSTSWEEP_WORKER__CONCURRENCY=8`
pub const ENV_PREFIX: &str = "DUSTSWEEP";

/// Configuration loader with support for multiple formats and sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Supports TOML, YAML, and JSON formats based on file extension
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::LoadError("No file extension found".to_string()))?;

        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loading configuration file");

        match extension {
            "toml" => Self::from_toml(&content),
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {extension}"
            ))),
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<AppConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(content: &str) -> Result<AppConfig> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<AppConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from environment variables with the default prefix
    pub fn from_env() -> Result<AppConfig> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load configuration from environment variables with custom prefix
    ///
    /// Sections are separated by a double underscore so field names keep
    /// their own underscores: `DUSTSWEEP_SERVICE__LOG_LEVEL=debug`.
    pub fn from_env_with_prefix(prefix: &str) -> Result<AppConfig> {
        Self::builder().add_env(prefix).build()
    }

    /// Load a file and overlay environment variables key by key
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<AppConfig> {
        if path.extension().is_none() {
            return Err(ConfigError::LoadError("No file extension found".to_string()));
        }
        Self::builder()
            .add_file(path, true)
            .add_env(env_prefix)
            .build()
    }

    /// Build configuration using the config crate's builder pattern
    ///
    /// Later sources override earlier ones
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder {
            builder: Config::builder(),
        }
    }
}

/// Builder for layered configuration loading
pub struct ConfigLoaderBuilder {
    builder: ConfigBuilder<config::builder::DefaultState>,
}

impl ConfigLoaderBuilder {
    /// Add a configuration file source
    pub fn add_file(mut self, path: &Path, required: bool) -> Self {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };

        self.builder = self
            .builder
            .add_source(File::from(path).format(format).required(required));
        self
    }

    /// Add environment variable source with prefix
    pub fn add_env(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__"),
        );
        self
    }

    /// Set a default value for a key
    pub fn set_default(mut self, key: &str, value: &str) -> Result<Self> {
        self.builder = self.builder.set_default(key, value)?;
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> Result<AppConfig> {
        let config = self.builder.build()?;
        config.try_deserialize().map_err(ConfigError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dustsweep_metrics::LogFormat;
    use dustsweep_types::PriorityMode;
    use rust_decimal::Decimal;
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let toml = r#"
            [service]
            log_level = "debug"
            log_format = "json"
            default_priority = "speed"

            [chains.ethereum]
            gas_estimate_usd = "2.50"

            [optimizer]
            min_sweep_value_usd = "2"
            quote_timeout_ms = 5000

            [worker]
            concurrency = 8
        "#;

        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.service.log_level, "debug");
        assert_eq!(config.service.log_format, LogFormat::Json);
        assert_eq!(config.service.default_priority, PriorityMode::Speed);
        assert_eq!(
            config.chains["ethereum"].gas_estimate_usd,
            Some(Decimal::new(250, 2))
        );
        assert_eq!(config.optimizer.min_sweep_value_usd, Decimal::from(2));
        assert_eq!(config.worker.concurrency, 8);
        // untouched sections keep their defaults
        assert_eq!(config.worker.jobs_per_second, 5);
        assert_eq!(config.tracking.max_attempts, 60);
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
service:
  log_level: warn
chains:
  bsc:
    stablecoin_decimals: 18
tracking:
  initial_delay_secs: 10
  max_delay_secs: 60
  max_attempts: 30
        "#;

        let config = ConfigLoader::from_yaml(yaml).unwrap();
        assert_eq!(config.service.log_level, "warn");
        assert_eq!(config.chains["bsc"].stablecoin_decimals, Some(18));
        assert_eq!(config.tracking.max_attempts, 30);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"
{
  "service": { "metrics_enabled": false },
  "cache": { "plan_ttl_secs": 600, "max_history": 50 }
}
        "#;

        let config = ConfigLoader::from_json(json).unwrap();
        assert!(!config.service.metrics_enabled);
        assert_eq!(config.cache.plan_ttl_secs, 600);
        assert_eq!(config.cache.max_history, 50);
        assert_eq!(config.cache.job_ttl_secs, 3600);
    }

    #[test]
    fn test_load_from_file() {
        let toml = r#"
[service]
log_level = "debug"

[worker]
step_timeout_secs = 60
        "#;

        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(config.service.log_level, "debug");
        assert_eq!(config.worker.step_timeout_secs, 60);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new()
            .suffix(".ini")
            .tempfile()
            .unwrap();
        assert!(matches!(
            ConfigLoader::from_file(file.path()),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    fn test_env_overrides_file_per_key() {
        let toml = r#"
[service]
log_level = "debug"

[worker]
concurrency = 4
jobs_per_second = 2
        "#;

        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        std::env::set_var("DUSTSWEEP_LOADER_TEST_WORKER__CONCURRENCY", "12");
        let config =
            ConfigLoader::from_file_with_env(file.path(), "DUSTSWEEP_LOADER_TEST").unwrap();
        std::env::remove_var("DUSTSWEEP_LOADER_TEST_WORKER__CONCURRENCY");

        assert_eq!(config.worker.concurrency, 12);
        assert_eq!(config.worker.jobs_per_second, 2);
        assert_eq!(config.service.log_level, "debug");
    }

    #[test]
    fn test_shipped_default_config_loads() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml"));
        let config = ConfigLoader::from_file(path).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
