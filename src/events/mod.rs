//! # Orchestrator Events
//!
//! Lifecycle notifications for workflow invocations, delivered over a
//! broadcast channel so any number of observers (a UI, the CLI, tests) can
//! follow progress without being wired into the poll loop.

pub mod publisher;

pub use publisher::{EventPublisher, OrchestratorEvent};
