//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file and environment overrides
//! using the `config` crate, then validates the result.

use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::OrderStreamConfig;
use crate::error::Result;

/// Default location of the configuration file, relative to the working directory
const DEFAULT_CONFIG_FILE: &str = "config/order-stream.toml";

/// Environment variable naming an explicit configuration file
const CONFIG_PATH_VAR: &str = "ORDER_STREAM_CONFIG";

/// Prefix for per-field environment overrides
const ENV_PREFIX: &str = "ORDER_STREAM";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default sources
    pub fn load() -> Result<OrderStreamConfig> {
        let path = env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from_path(&path)
    }

    /// Load configuration using `path` as the (optional) TOML file
    pub fn load_from_path(path: &Path) -> Result<OrderStreamConfig> {
        let environment = Self::detect_environment();
        debug!(
            environment = %environment,
            config_file = %path.display(),
            "Loading configuration"
        );

        let config: OrderStreamConfig = Config::builder()
            .add_source(Config::try_from(&OrderStreamConfig::default())?)
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = %environment,
            cache_type = ?config.cache.cache_type,
            topic = %config.consumer.topic,
            dead_letter_enabled = config.dead_letter.enabled,
            max_retries = config.consumer.max_retries,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Current deployment environment
    pub fn detect_environment() -> String {
        env::var("ORDER_STREAM_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}
