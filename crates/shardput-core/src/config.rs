//! Producer configuration loaded from TOML.
//!
//! ```toml
//! stream_name = "otel-spans"
//!
//! [retry]
//! max_attempts = 5
//! initial_delay_ms = 100
//! max_delay_ms = 5000
//! backoff_factor = 2.0
//! jitter_percent = 0.2
//!
//! [log]
//! level = "info"
//! format = "json"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batcher::BatcherBuilder;
use crate::error::{ConfigError, Error, Result};
use crate::logging::LogConfig;
use crate::retry::RetryPolicy;
use crate::submit::Submitter;

/// Top-level producer config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Destination stream
    pub stream_name: String,
    pub retry: RetryConfig,
    pub log: LogConfig,
}

/// Retry settings in config-file units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter_percent: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            backoff_factor: policy.backoff_factor,
            jitter_percent: policy.jitter_percent,
        }
    }
}

impl RetryConfig {
    /// Convert to a validated [`RetryPolicy`].
    pub fn to_policy(&self) -> std::result::Result<RetryPolicy, ConfigError> {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_factor: self.backoff_factor,
            jitter_percent: self.jitter_percent,
            max_attempts: self.max_attempts,
        };
        policy.validate().map_err(|err| match err {
            Error::Configuration(msg) => ConfigError::Invalid(msg),
            other => ConfigError::Invalid(other.to_string()),
        })?;
        Ok(policy)
    }
}

impl ProducerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.stream_name.trim().is_empty() {
            return Err(ConfigError::Invalid("stream_name must not be empty".to_string()));
        }
        self.retry.to_policy()?;
        Ok(())
    }

    /// Start a [`BatcherBuilder`] wired from this config.
    pub fn builder_for<S: Submitter>(&self, submitter: S) -> Result<BatcherBuilder<S>> {
        let policy = self.retry.to_policy()?;
        Ok(BatcherBuilder::new(self.stream_name.clone())
            .submitter(submitter)
            .retry_policy(policy))
    }
}
