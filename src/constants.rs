//! # System Constants
//!
//! Endpoint paths, event names, and the default operational boundaries of the
//! workflow orchestrator.

use crate::state_machine::TaskState;

/// Path segments of the backend REST endpoints consumed by the orchestrator
pub mod endpoints {
    /// POST /tasks/run/<slug>
    pub const RUN: [&str; 2] = ["tasks", "run"];
    /// GET /datasets/sources
    pub const DATA_SOURCES: [&str; 2] = ["datasets", "sources"];
    pub const TASKS: &str = "tasks";
    /// GET /tasks/{id}/status
    pub const STATUS: &str = "status";
    /// GET /tasks/{id}/result
    pub const RESULT: &str = "result";
}

/// Event names published on the orchestrator's event channel
pub mod events {
    pub const WORKFLOW_LAUNCHED: &str = "workflow.launched";
    pub const WORKFLOW_STATE_UPDATED: &str = "workflow.state_updated";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
}

/// Polling defaults
pub mod polling {
    /// Fixed tick interval
    pub const DEFAULT_INTERVAL_MS: u64 = 1000;

    /// Ticks before unready jobs are declared timed out (one hour at 1s)
    pub const DEFAULT_MAX_TICKS: u32 = 3600;

    /// Progress shown for an acknowledged first stage with no metric yet
    pub const FIRST_STAGE_FLOOR: u8 = 1;

    /// Progress shown for an acknowledged dependent stage with no metric yet
    pub const DEPENDENT_STAGE_FLOOR: u8 = 10;
}

/// Failure classification signatures
pub mod signatures {
    /// Lower-cased marker of a backing-store connectivity fault
    pub const DATABASE_CONNECTION_FAILED: &str = "database connection failed";
}

/// Backend connection defaults
pub mod backend {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
    pub const DEFAULT_TIMEOUT_MS: u64 = 30000;
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";
}

/// State groupings used by the merger and coordinator
pub mod status_groups {
    use super::TaskState;

    /// States after which a job never changes again
    pub const TERMINAL_STATES: &[TaskState] = &[TaskState::Success, TaskState::Failure];

    /// States in which the backend still owns the job
    pub const RUNNING_STATES: &[TaskState] = &[
        TaskState::Pending,
        TaskState::Started,
        TaskState::Progress,
        TaskState::Retry,
    ];
}
