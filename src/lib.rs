#![allow(clippy::doc_markdown)] // Allow technical terms like ETL, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # ETL Orchestrator
//!
//! Workflow orchestration and status-tracking client for a multi-stage
//! Extract → Transform → Load pipeline run by an external job backend.
//!
//! ## Overview
//!
//! The backend runs the actual jobs and exposes a small REST surface: kick off
//! a named workflow, read a job's status, read its result. This crate drives
//! that surface: it launches workflow variants, polls every spawned job on a
//! fixed interval until it is terminal, merges the per-job statuses into one
//! presentable state, and classifies failures so a stalled or broken job ends
//! the poll loop instead of keeping it alive.
//!
//! ## Module Organization
//!
//! - [`client`] - `JobBackend` trait, REST implementation, auth-failure decorator
//! - [`orchestration`] - Launcher, guard, poll coordinator, state merger, facade
//! - [`models`] - Job statuses, kickoff payloads, workflow variants
//! - [`state_machine`] - Job states and the poll phase
//! - [`events`] - Broadcast lifecycle events
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use etl_orchestrator::config::ConfigManager;
//! use etl_orchestrator::events::OrchestratorEvent;
//! use etl_orchestrator::models::{LaunchParams, WorkflowVariant};
//! use etl_orchestrator::orchestration::Orchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load(None)?.into_config();
//! let orchestrator = Orchestrator::from_config(config)?;
//! let mut events = orchestrator.subscribe();
//!
//! let invocation = orchestrator
//!     .launch_workflow(WorkflowVariant::ExtractTransformLoad, LaunchParams::default())
//!     .await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let OrchestratorEvent::WorkflowCompleted { state, .. } = event {
//!         if state.invocation_id == invocation.invocation_id {
//!             println!("finished, failed = {}", state.failed);
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

pub use client::{AuthFailureHandler, AuthPolicyBackend, HttpJobBackend, JobBackend};
pub use config::{ConfigManager, OrchestratorConfig};
pub use error::{ClientError, ConfigurationError, LaunchError, OrchestratorError, Result};
pub use events::{EventPublisher, OrchestratorEvent};
pub use models::{JobId, LaunchParams, Slot, Stage, TaskStatus, WorkflowInvocation, WorkflowVariant};
pub use orchestration::{FailureCategory, Orchestrator, WorkflowState};
pub use state_machine::{PollPhase, TaskState};
