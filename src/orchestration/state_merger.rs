//! # Workflow State Merger
//!
//! Reduces the per-job statuses of one invocation into a presentable
//! [`WorkflowState`]: per-stage progress, classification, and the overall
//! `done`/`failed` flags.

use serde::Serialize;
use uuid::Uuid;

use super::error_classifier::{FailureCategory, FailureClassifier};
use crate::config::PollingConfig;
use crate::constants::polling;
use crate::models::{Slot, Stage, TaskStatus, WorkflowInvocation, WorkflowVariant};
use crate::state_machine::{PollPhase, TaskState};

/// Presentable view of one tracked job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSnapshot {
    pub stage: Stage,
    pub status: TaskStatus,
    /// Progress in percent, 0..=100
    pub progress: u8,
    pub failure: FailureCategory,
}

/// Merged state of a workflow invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowState {
    pub invocation_id: Uuid,
    pub variant: WorkflowVariant,
    pub slot: Slot,
    pub phase: PollPhase,
    pub stages: Vec<StageSnapshot>,
    /// Every tracked job is ready
    pub done: bool,
    /// At least one tracked job failed
    pub failed: bool,
    /// Completed poll ticks
    pub ticks: u32,
}

impl WorkflowState {
    pub fn stage(&self, stage: Stage) -> Option<&StageSnapshot> {
        self.stages.iter().find(|snapshot| snapshot.stage == stage)
    }

    /// Done without any failed stage
    pub fn succeeded(&self) -> bool {
        self.done && !self.failed
    }
}

/// Reducer from job statuses to [`WorkflowState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowStateMerger {
    first_stage_floor: u8,
    dependent_stage_floor: u8,
}

impl Default for WorkflowStateMerger {
    fn default() -> Self {
        Self::with_floors(polling::FIRST_STAGE_FLOOR, polling::DEPENDENT_STAGE_FLOOR)
    }
}

impl WorkflowStateMerger {
    pub fn new(config: &PollingConfig) -> Self {
        Self::with_floors(config.first_stage_floor, config.dependent_stage_floor)
    }

    pub fn with_floors(first_stage_floor: u8, dependent_stage_floor: u8) -> Self {
        Self {
            first_stage_floor: first_stage_floor.min(100),
            dependent_stage_floor: dependent_stage_floor.min(100),
        }
    }

    /// Project a job status onto a 0..=100 progress value.
    ///
    /// The floor for an acknowledged job with no metric is a display
    /// convention only; it never reflects real work done.
    pub fn project_progress(
        &self,
        status: &TaskStatus,
        failure: FailureCategory,
        first_stage: bool,
    ) -> u8 {
        if status.state == TaskState::Success
            || status.state == TaskState::Failure
            || failure == FailureCategory::InfraConnectivity
        {
            return 100;
        }

        let info = status.info.as_ref();
        if let Some(percent) = info.and_then(|info| info.percent()) {
            return clamp_percent(percent);
        }

        let ratio = info.and_then(|info| match (info.processed(), info.total()) {
            (Some(processed), Some(total)) if total > 0.0 => Some(processed * 100.0 / total),
            _ => None,
        });
        if let Some(percent) = ratio {
            return clamp_percent(percent.floor());
        }

        if first_stage {
            self.first_stage_floor
        } else {
            self.dependent_stage_floor
        }
    }

    /// Merge statuses into a workflow state.
    ///
    /// `statuses` is parallel to `invocation.stages`.
    pub fn merge(
        &self,
        invocation: &WorkflowInvocation,
        statuses: &[TaskStatus],
        phase: PollPhase,
        ticks: u32,
    ) -> WorkflowState {
        let stages: Vec<StageSnapshot> = invocation
            .stages
            .iter()
            .zip(statuses)
            .enumerate()
            .map(|(index, (tracked, status))| {
                let failure = FailureClassifier::classify(status);
                StageSnapshot {
                    stage: tracked.stage,
                    status: status.clone(),
                    progress: self.project_progress(status, failure, index == 0),
                    failure,
                }
            })
            .collect();

        let done = stages.iter().all(|snapshot| snapshot.status.ready);
        let failed = stages.iter().any(|snapshot| snapshot.failure.is_failure());

        WorkflowState {
            invocation_id: invocation.invocation_id,
            variant: invocation.variant,
            slot: invocation.slot(),
            phase,
            stages,
            done,
            failed,
            ticks,
        }
    }
}

fn clamp_percent(value: f64) -> u8 {
    value.clamp(0.0, 100.0) as u8
}
