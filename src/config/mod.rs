//! # Sidecar Configuration System
//!
//! Typed settings for the bulk dispatcher, the actor timer engine and
//! telemetry, loaded in layers by [`ConfigManager`]:
//!
//! 1. built-in defaults ([`SidecarConfig::default`])
//! 2. an optional `sidecar.{toml,yaml,json}` file in the config directory
//! 3. `SIDECAR__<SECTION>__<FIELD>` environment variables
//!
//! The merged result is validated before it is handed out.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sidecar_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let retries = manager.config().pubsub.max_retries;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::pubsub::channel::AppProtocol;
use serde::{Deserialize, Serialize};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SidecarConfig {
    pub pubsub: PubSubConfig,
    pub actors: ActorsConfig,
    pub telemetry: TelemetryConfig,
}

/// Bulk subscribe dispatch settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PubSubConfig {
    /// Protocol used to reach the application
    pub app_protocol: AppProtocol,
    /// Retries per route group after the first invocation
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            app_protocol: AppProtocol::Http,
            max_retries: 0,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_ms: 5_000,
        }
    }
}

/// Actor timer settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActorsConfig {
    /// Callback used for timers created without one
    pub default_timer_callback: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Overrides the environment-derived log level when set
    pub log_level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl SidecarConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.pubsub.backoff_multiplier < 1.0 || !self.pubsub.backoff_multiplier.is_finite() {
            return Err(ConfigurationError::invalid_value(
                "pubsub.backoff_multiplier",
                self.pubsub.backoff_multiplier.to_string(),
                "multiplier must be a finite number of at least 1.0",
            ));
        }

        if self.pubsub.max_backoff_ms < self.pubsub.initial_backoff_ms {
            return Err(ConfigurationError::invalid_value(
                "pubsub.max_backoff_ms",
                self.pubsub.max_backoff_ms.to_string(),
                "max backoff must not be lower than initial backoff",
            ));
        }

        if let Some(callback) = &self.actors.default_timer_callback {
            if callback.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "actors.default_timer_callback",
                    "actors configuration",
                ));
            }
        }

        Ok(())
    }
}
