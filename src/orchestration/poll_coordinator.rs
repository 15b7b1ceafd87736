//! # Poll Coordinator
//!
//! Owns the tracked statuses of one [`WorkflowInvocation`] and drives them to
//! readiness.
//!
//! [`PollCoordinator::tick`] is one fan-out/fan-in round over every job that
//! is not ready yet. [`PollCoordinator::spawn`] runs ticks on a fixed interval
//! in a tokio task until the invocation is `Done` or the returned
//! [`PollHandle`] is cancelled. The next sleep starts only after every status
//! call of the current tick has resolved, so ticks never overlap.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state_merger::{WorkflowState, WorkflowStateMerger};
use crate::client::JobBackend;
use crate::config::PollingConfig;
use crate::logging::{log_error, log_job_operation};
use crate::models::{Slot, TaskStatus, WorkflowInvocation};
use crate::state_machine::PollPhase;

/// Receiver of runner output.
///
/// Implementations must check `token` under the same lock that guards their
/// state so nothing is written once the token is cancelled.
pub trait StateSink: Send + Sync + 'static {
    /// Publish an intermediate state; return `false` to stop the runner
    fn on_update(&self, state: WorkflowState, token: &CancellationToken) -> bool;

    /// Publish the final state; called at most once per runner
    fn on_completed(&self, state: WorkflowState, token: &CancellationToken);
}

/// Explicit `Running -> Done` state object for one invocation
pub struct PollCoordinator {
    backend: Arc<dyn JobBackend>,
    invocation: WorkflowInvocation,
    /// Parallel to `invocation.stages`
    statuses: Vec<TaskStatus>,
    phase: PollPhase,
    ticks: u32,
    max_ticks: Option<u32>,
    merger: WorkflowStateMerger,
}

impl std::fmt::Debug for PollCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollCoordinator")
            .field("invocation_id", &self.invocation.invocation_id)
            .field("phase", &self.phase)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl PollCoordinator {
    /// Seed a coordinator with every tracked job in `PENDING`
    pub fn new(
        backend: Arc<dyn JobBackend>,
        invocation: WorkflowInvocation,
        config: &PollingConfig,
    ) -> Self {
        let statuses = invocation
            .job_ids()
            .cloned()
            .map(TaskStatus::pending)
            .collect();

        Self {
            backend,
            invocation,
            statuses,
            phase: PollPhase::Running,
            ticks: 0,
            max_ticks: config.max_ticks,
            merger: WorkflowStateMerger::new(config),
        }
    }

    pub fn invocation(&self) -> &WorkflowInvocation {
        &self.invocation
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn statuses(&self) -> &[TaskStatus] {
        &self.statuses
    }

    /// Merged view of the current statuses
    pub fn state(&self) -> WorkflowState {
        self.merger
            .merge(&self.invocation, &self.statuses, self.phase, self.ticks)
    }

    /// Run one poll round.
    ///
    /// Fetch errors become synthetic FAILURE statuses. A `Done` coordinator
    /// makes no calls and returns its final state.
    pub async fn tick(&mut self) -> WorkflowState {
        if self.phase.is_terminal() {
            return self.state();
        }
        self.ticks += 1;

        let backend = &self.backend;
        let fetches = self
            .invocation
            .stages
            .iter()
            .zip(&self.statuses)
            .enumerate()
            .filter(|(_, (_, status))| !status.ready)
            .map(|(index, (tracked, _))| {
                let job_id = tracked.job_id.clone();
                async move {
                    let result = backend.get_status(&job_id).await;
                    (index, job_id, result)
                }
            });
        let results = join_all(fetches).await;

        for (index, job_id, result) in results {
            let status = match result {
                Ok(mut status) => {
                    status.job_id = job_id;
                    status.normalized()
                }
                Err(e) => {
                    log_error(
                        "poll_coordinator",
                        "get_status",
                        &e.to_string(),
                        Some(job_id.as_str()),
                    );
                    TaskStatus::synthetic_failure(job_id, e.failure_message())
                }
            };
            self.apply(index, status);
        }

        if !self.all_ready() {
            if let Some(max_ticks) = self.max_ticks.filter(|max| self.ticks >= *max) {
                self.expire_unready(max_ticks);
            }
        }

        if self.all_ready() {
            self.phase = PollPhase::Done;
            info!(
                invocation_id = %self.invocation.invocation_id,
                variant = %self.invocation.variant,
                ticks = self.ticks,
                "All tracked jobs are ready"
            );
        }

        self.state()
    }

    /// Run ticks every `interval` in a spawned task
    pub fn spawn<S: StateSink>(mut self, interval: Duration, sink: Arc<S>) -> PollHandle {
        let token = CancellationToken::new();
        let slot = self.invocation.slot();
        let invocation_id = self.invocation.invocation_id;
        let runner_token = token.clone();

        let join = tokio::spawn(async move {
            loop {
                let state = tokio::select! {
                    biased;
                    _ = runner_token.cancelled() => {
                        debug!(invocation_id = %invocation_id, "Runner cancelled during tick");
                        break;
                    }
                    state = self.tick() => state,
                };

                if state.phase.is_terminal() {
                    sink.on_completed(state, &runner_token);
                    break;
                }
                if !sink.on_update(state, &runner_token) {
                    break;
                }

                tokio::select! {
                    biased;
                    _ = runner_token.cancelled() => {
                        debug!(invocation_id = %invocation_id, "Runner cancelled during wait");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        PollHandle {
            token,
            join,
            slot,
            invocation_id,
        }
    }

    /// Replace a stored status unless it is already ready
    fn apply(&mut self, index: usize, status: TaskStatus) {
        let Some(current) = self.statuses.get_mut(index) else {
            return;
        };
        if current.ready {
            return;
        }
        log_job_operation(
            "poll",
            status.job_id.as_str(),
            &self.invocation.stages[index].stage.to_string(),
            &status.state.to_string(),
            status.info.as_ref().and_then(|info| info.message()),
        );
        *current = status;
    }

    fn all_ready(&self) -> bool {
        self.statuses.iter().all(TaskStatus::is_ready)
    }

    fn expire_unready(&mut self, max_ticks: u32) {
        let message = format!("Polling timed out after {max_ticks} ticks");
        for status in self.statuses.iter_mut().filter(|status| status.state.is_active()) {
            warn!(
                job_id = %status.job_id,
                last_state = %status.state,
                max_ticks,
                "Job did not finish in time"
            );
            *status = TaskStatus::synthetic_failure(status.job_id.clone(), message.clone());
        }
    }
}

/// Handle to a spawned runner
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
    slot: Slot,
    invocation_id: Uuid,
}

impl PollHandle {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop the runner; safe to call any number of times
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the runner task to exit
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            warn!(invocation_id = %self.invocation_id, error = %e, "Runner task ended abnormally");
        }
    }
}
