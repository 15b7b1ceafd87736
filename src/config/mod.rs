//! # Orchestrator Configuration
//!
//! Layered configuration for the backend connection, the poll loop, and launch
//! policy. Values come from defaults, an optional TOML file (with an optional
//! per-environment overlay), and `ETL_`-prefixed environment variables, in
//! that order of increasing precedence.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use etl_orchestrator::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(None)?;
//! let interval = manager.config().polling.interval();
//! println!("polling every {}ms", interval.as_millis());
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants;
use crate::error::ConfigurationError;

pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub launch: LaunchConfig,
}

impl OrchestratorConfig {
    /// Reject values the orchestrator cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.backend.validate()?;
        self.polling.validate()?;
        Ok(())
    }
}

/// Connection settings for the job backend
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the job-control API (e.g., "<http://localhost:5000>")
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Retry attempts for idempotent reads; kickoff is never retried
    pub max_retries: u32,
    /// Pre-issued bearer token attached to every request
    pub bearer_token: Option<String>,
    /// API key sent in `api_key_header` when no bearer token is set
    pub api_key: Option<String>,
    pub api_key_header: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: constants::backend::DEFAULT_BASE_URL.to_string(),
            timeout_ms: constants::backend::DEFAULT_TIMEOUT_MS,
            max_retries: constants::backend::DEFAULT_MAX_RETRIES,
            bearer_token: None,
            api_key: None,
            api_key_header: constants::backend::DEFAULT_API_KEY_HEADER.to_string(),
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[MASKED]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[MASKED]"))
            .field("api_key_header", &self.api_key_header)
            .finish()
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "backend.base_url",
                "must not be empty",
            ));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            ConfigurationError::invalid_value("backend.base_url", format!("invalid URL: {e}"))
        })?;
        if self.timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "backend.timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.api_key.is_some() && self.api_key_header.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "backend.api_key_header",
                "must be set when api_key is configured",
            ));
        }
        Ok(())
    }
}

/// Poll loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Fixed delay between ticks
    pub interval_ms: u64,
    /// Ticks after which unready jobs are declared timed out; `None` polls forever
    pub max_ticks: Option<u32>,
    /// Progress floor for the first stage before any metric arrives
    pub first_stage_floor: u8,
    /// Progress floor for dependent stages before any metric arrives
    pub dependent_stage_floor: u8,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: constants::polling::DEFAULT_INTERVAL_MS,
            max_ticks: Some(constants::polling::DEFAULT_MAX_TICKS),
            first_stage_floor: constants::polling::FIRST_STAGE_FLOOR,
            dependent_stage_floor: constants::polling::DEPENDENT_STAGE_FLOOR,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "polling.interval_ms",
                "must be greater than zero",
            ));
        }
        if self.max_ticks == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "polling.max_ticks",
                "must be at least 1 when set",
            ));
        }
        for (field, floor) in [
            ("polling.first_stage_floor", self.first_stage_floor),
            ("polling.dependent_stage_floor", self.dependent_stage_floor),
        ] {
            if floor > 100 {
                return Err(ConfigurationError::invalid_value(field, "must be at most 100"));
            }
        }
        Ok(())
    }
}

/// Launch policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Refuse extract launches when no data source is configured
    pub require_data_sources: bool,
}
