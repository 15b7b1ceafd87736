use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::status_groups;

/// Backend job state as reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Launched but not yet picked up by a worker
    Pending,
    /// A worker acknowledged the job
    Started,
    /// Job is reporting intermediate progress
    Progress,
    /// Job finished successfully
    Success,
    /// Job finished with an error
    Failure,
    /// Backend will re-attempt the job
    Retry,
}

impl TaskState {
    /// Check if this is a terminal state (the job is ready)
    pub fn is_terminal(&self) -> bool {
        status_groups::TERMINAL_STATES.contains(self)
    }

    /// Check if this is an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Check if the backend still owns the job
    pub fn is_active(&self) -> bool {
        status_groups::RUNNING_STATES.contains(self)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Started => write!(f, "STARTED"),
            Self::Progress => write!(f, "PROGRESS"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
            Self::Retry => write!(f, "RETRY"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "STARTED" => Ok(Self::Started),
            "PROGRESS" => Ok(Self::Progress),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "RETRY" => Ok(Self::Retry),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// Default state for a freshly launched job
impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Lifecycle of one poll coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    /// Ticks are being scheduled
    Running,
    /// Every tracked job is ready; no further ticks
    Done,
}

impl PollPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl Default for PollPhase {
    fn default() -> Self {
        Self::Running
    }
}
