//! Gateway configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional config file
//! (format detected from the extension: `.toml`, `.yaml`/`.yml`, `.json`),
//! then `PAGELIFT__*` environment variables with `__` separating nested keys,
//! e.g. `PAGELIFT__IDLE__THRESHOLD_SECS=300`. CLI flags are applied on top by
//! the binary.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use pagelift_foundation::pipeline::DEFAULT_PROMPT;
use pagelift_kernel::{IdlePolicy, LoadConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "PAGELIFT";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config parsing error: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Which extractor to load and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub variant: String,
    pub device: String,
    /// Load at startup instead of on the first request.
    pub preload: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            variant: "otsu".to_string(),
            device: "cpu".to_string(),
            preload: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleSettings {
    pub poll_interval_secs: u64,
    pub threshold_secs: u64,
}

impl Default for IdleSettings {
    fn default() -> Self {
        let policy = IdlePolicy::default();
        Self {
            poll_interval_secs: policy.poll_interval.as_secs(),
            threshold_secs: policy.idle_threshold.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub model: ModelSettings,
    pub idle: IdleSettings,
    /// Extractions allowed to run against the loaded model at once.
    pub max_concurrent_extractions: u32,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
    pub default_prompt: String,
    pub log_format: LogFormat,
    /// Log request headers at debug level.
    pub log_request_headers: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8020,
            model: ModelSettings::default(),
            idle: IdleSettings::default(),
            max_concurrent_extractions: 1,
            max_upload_bytes: 50 * 1024 * 1024,
            default_prompt: DEFAULT_PROMPT.to_string(),
            log_format: LogFormat::default(),
            log_request_headers: false,
        }
    }
}

impl GatewayConfig {
    /// Load from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, environment())
    }

    /// Load from an optional file plus the given environment source.
    pub fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: GatewayConfig = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("idle.poll_interval_secs must be > 0".into()));
        }
        if self.idle.threshold_secs == 0 {
            return Err(ConfigError::Invalid("idle.threshold_secs must be > 0".into()));
        }
        if self.max_concurrent_extractions == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_extractions must be >= 1".into(),
            ));
        }
        if self.model.variant.trim().is_empty() || self.model.device.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "model.variant and model.device must be set".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_policy(&self) -> IdlePolicy {
        IdlePolicy::new(
            Duration::from_secs(self.idle.poll_interval_secs),
            Duration::from_secs(self.idle.threshold_secs),
        )
    }

    pub fn load_config(&self) -> LoadConfig {
        LoadConfig::new(&self.model.variant, &self.model.device)
    }
}

/// `PAGELIFT__SECTION__KEY` environment source.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
