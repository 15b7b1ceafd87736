pub mod data_source;
pub mod task_status;
pub mod workflow;

// Re-export core models for easy access
pub use data_source::{DataSourceList, DataSourceSummary};
pub use task_status::{JobId, TaskInfo, TaskResult, TaskStatus};
pub use workflow::{
    KickoffRequest, KickoffResponse, LaunchParams, Slot, Stage, TrackedStage, WorkflowInvocation,
    WorkflowVariant,
};
