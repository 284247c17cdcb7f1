//! Configuration management for the droplet bootstrapper

use bootstrap_types::{LockMode, PartialPairPolicy};
use config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

const ENV_PREFIX: &str = "BOOTSTRAP";

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

/// Droplet sizing and placement
#[derive(Debug, Clone, Deserialize)]
pub struct DropletConfig {
    pub image: String,
    pub region: String,
    pub size: String,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Stack whose key pair is resolved; names the key files
    pub stack: String,
    /// Cloud-init payload forwarded to the droplet
    pub user_data_path: PathBuf,
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub lock_mode: LockMode,
    #[serde(default)]
    pub partial_pair_policy: PartialPairPolicy,
    pub droplet: DropletConfig,
}

impl BootstrapConfig {
    /// Load configuration from `BOOTSTRAP_*` environment variables
    ///
    /// Nested keys use a double underscore, e.g. `BOOTSTRAP_DROPLET__REGION`.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration from an explicit variable map instead of the
    /// process environment
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, ConfigLoadError> {
        let source: config::Map<String, String> = vars.into_iter().collect();
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(source)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigLoadError> {
        let config: Self = Config::builder()
            .set_default("user_data_path", "userData.txt")?
            .set_default("log_level", "info")?
            .set_default("droplet.image", "ubuntu-20-04-x64")?
            .set_default("droplet.region", "nyc3")?
            .set_default("droplet.size", "s-1vcpu-1gb")?
            .add_source(environment.prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.stack.is_empty() {
            return Err(ConfigLoadError::Invalid(
                "BOOTSTRAP_STACK must not be empty".to_string(),
            ));
        }
        if self.user_data_path.as_os_str().is_empty() {
            return Err(ConfigLoadError::Invalid(
                "BOOTSTRAP_USER_DATA_PATH must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        if self.log_level.is_empty() {
            "info"
        } else {
            &self.log_level
        }
    }
}
