//! Configuration Loader
//!
//! Layers defaults, an optional settings file and environment overrides
//! using the `config` crate, then validates the merged result.

use super::error::{ConfigResult, ConfigurationError};
use super::SidecarConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base name of the optional settings file (`sidecar.toml`, `.yaml`, `.json`)
const CONFIG_FILE_STEM: &str = "sidecar";
const ENV_PREFIX: &str = "SIDECAR";
const ENV_SEPARATOR: &str = "__";

/// Loaded and validated sidecar configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: SidecarConfig,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration from the default directory and process environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_environment(config_dir, None)
    }

    /// Load configuration with an explicit environment map instead of the
    /// process environment. Keys use the `SIDECAR__SECTION__FIELD` form.
    pub fn load_with_environment(
        config_dir: Option<PathBuf>,
        environment: Option<config::Map<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let explicit = config_dir.is_some();
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);
        if explicit && !config_directory.is_dir() {
            return Err(ConfigurationError::DirectoryNotFound {
                path: config_directory,
            });
        }

        debug!(
            config_directory = %config_directory.display(),
            "Loading sidecar configuration"
        );

        let config = Self::build(&config_directory, environment)?;
        config.validate()?;

        info!(
            app_protocol = %config.pubsub.app_protocol,
            max_retries = config.pubsub.max_retries,
            json_logs = config.telemetry.json_logs,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &SidecarConfig {
        &self.config
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn build(
        config_directory: &Path,
        environment: Option<config::Map<String, String>>,
    ) -> ConfigResult<SidecarConfig> {
        let defaults = Config::try_from(&SidecarConfig::default())
            .map_err(|e| ConfigurationError::load_error("defaults", e))?;

        let file_stem = config_directory.join(CONFIG_FILE_STEM);
        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&file_stem.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(environment),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(file_stem.display().to_string(), e))?;

        merged
            .try_deserialize::<SidecarConfig>()
            .map_err(ConfigurationError::deserialization_error)
    }

    fn default_config_directory() -> PathBuf {
        env::var("SIDECAR_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
