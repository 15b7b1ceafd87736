//! # Error Types
//!
//! Structured errors for the orchestrator. Transport failures surface as
//! [`ClientError`], launch-time rejections as [`LaunchError`]. Polling-time
//! failures never appear here: the poll coordinator folds them into state.

use thiserror::Error;

use crate::models::{Slot, WorkflowInvocation, WorkflowVariant};

/// Client operation result type
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors raised while talking to the job backend
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {field} - {reason}")]
    InvalidResponse { field: String, reason: String },

    #[error("Task not finished: {task_id}")]
    NotReady { task_id: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ClientError {
    /// Create an API error from an HTTP status and response body
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid response error for protocol violations
    pub fn invalid_response(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is recoverable (worth retrying on an idempotent read)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::HttpError(e) => e.is_timeout() || e.is_connect(),
            ClientError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the backend rejected the caller's credentials (401/403)
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::ApiError { status, .. } if *status == 401 || *status == 403)
    }

    /// Text placed into a synthesized failure status.
    ///
    /// API errors contribute the raw response body so the classifier sees
    /// exactly what the backend said.
    #[must_use]
    pub fn failure_message(&self) -> String {
        match self {
            ClientError::ApiError { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Reasons a workflow launch did not start
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Slot '{slot}' already has an active workflow")]
    SlotBusy { slot: Slot },

    #[error("Data source check failed: {0}")]
    Precheck(#[source] ClientError),

    #[error("Kickoff request failed: {0}")]
    Kickoff(#[source] ClientError),

    #[error("Backend returned no job identifiers for workflow '{variant}'")]
    NoJobIds { variant: WorkflowVariant },

    #[error("No data sources are configured; nothing to extract")]
    NoDataSources,

    #[error("Orchestrator has been torn down")]
    ShutDown,

    /// The backend accepted the jobs but teardown happened before tracking began
    #[error(
        "Orchestrator was torn down after the backend accepted invocation {}; its jobs are not tracked",
        .invocation.invocation_id
    )]
    ShutDownAfterKickoff { invocation: WorkflowInvocation },
}

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Umbrella error for callers that mix operations
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
