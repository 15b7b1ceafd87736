//! # Workflow Orchestration
//!
//! Launching and tracking of ETL workflow invocations against the job backend.
//!
//! ## Core Components
//!
//! - **WorkflowLauncher**: reserves the slot and issues the kickoff call
//! - **SlotGuard**: at most one active invocation per slot
//! - **PollCoordinator**: fixed-interval fan-out/fan-in polling until every job is ready
//! - **WorkflowStateMerger**: per-job statuses to per-stage progress
//! - **FailureClassifier**: separates connectivity faults from ordinary failures
//! - **Orchestrator**: facade exposing launch, state, events and teardown
//!
//! ## Flow
//!
//! ```text
//! launch_workflow ──▶ SlotGuard::try_reserve ──▶ POST /tasks/run/<slug>
//!                                                     │
//!          WorkflowCompleted ◀── Done ◀── tick ◀──────┘
//!                                          │  ▲
//!                                          └──┘ every interval
//! ```

pub mod error_classifier;
pub mod guard;
pub mod launcher;
pub mod orchestrator;
pub mod poll_coordinator;
pub mod state_merger;

pub use error_classifier::{FailureCategory, FailureClassifier};
pub use guard::{SlotGuard, SlotOccupancy, SlotPermit};
pub use launcher::WorkflowLauncher;
pub use orchestrator::Orchestrator;
pub use poll_coordinator::{PollCoordinator, PollHandle, StateSink};
pub use state_merger::{StageSnapshot, WorkflowState, WorkflowStateMerger};
