//! # Orchestrator
//!
//! Facade wiring the launcher, the per-slot guard, poll runners and the event
//! publisher together. One `Orchestrator` serves both slots; each launched
//! invocation gets its own runner task.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::guard::SlotGuard;
use super::launcher::WorkflowLauncher;
use super::poll_coordinator::{PollCoordinator, PollHandle, StateSink};
use super::state_merger::WorkflowState;
use crate::client::{AuthFailureHandler, AuthPolicyBackend, HttpJobBackend, JobBackend};
use crate::config::{OrchestratorConfig, PollingConfig};
use crate::error::{ClientResult, LaunchError, Result};
use crate::events::{EventPublisher, OrchestratorEvent};
use crate::logging::log_workflow_operation;
use crate::models::{
    DataSourceSummary, JobId, LaunchParams, Slot, TaskResult, WorkflowInvocation, WorkflowVariant,
};

/// State shared between the facade and its runners
#[derive(Debug, Default)]
struct SlotBoard {
    guard: SlotGuard,
    states: Mutex<HashMap<Slot, WorkflowState>>,
    events: EventPublisher,
}

impl StateSink for SlotBoard {
    fn on_update(&self, state: WorkflowState, token: &CancellationToken) -> bool {
        let mut states = self.states.lock();
        if token.is_cancelled() {
            return false;
        }
        states.insert(state.slot, state.clone());
        self.events.publish(OrchestratorEvent::StateUpdated { state });
        true
    }

    fn on_completed(&self, state: WorkflowState, token: &CancellationToken) {
        let mut states = self.states.lock();
        if token.is_cancelled() {
            return;
        }
        self.guard.release(state.slot, state.invocation_id);
        log_workflow_operation(
            "complete",
            &state.slot.to_string(),
            Some(state.variant.slug()),
            Some(&state.invocation_id.to_string()),
            if state.failed { "failed" } else { "succeeded" },
            Some(&format!("ticks={}", state.ticks)),
        );
        states.insert(state.slot, state.clone());
        self.events.publish(OrchestratorEvent::WorkflowCompleted {
            state,
            completed_at: chrono::Utc::now(),
        });
    }
}

/// Entry point for launching and observing workflows
pub struct Orchestrator {
    backend: Arc<dyn JobBackend>,
    launcher: WorkflowLauncher,
    polling: PollingConfig,
    board: Arc<SlotBoard>,
    runners: Mutex<HashMap<Uuid, PollHandle>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("endpoint", &self.backend.endpoint())
            .field("polling", &self.polling)
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish()
    }
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn JobBackend>, config: OrchestratorConfig) -> Self {
        let launcher = WorkflowLauncher::new(backend.clone(), config.launch);
        Self {
            backend,
            launcher,
            polling: config.polling,
            board: Arc::new(SlotBoard::default()),
            runners: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Validate `config` and connect to the REST backend it names
    pub fn from_config(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let backend = HttpJobBackend::new(&config.backend)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    /// Like [`Orchestrator::from_config`], reporting 401/403 responses to `handler`
    pub fn from_config_with_auth_handler(
        config: OrchestratorConfig,
        handler: Arc<dyn AuthFailureHandler>,
    ) -> Result<Self> {
        config.validate()?;
        let backend = AuthPolicyBackend::new(HttpJobBackend::new(&config.backend)?, handler);
        Ok(Self::new(Arc::new(backend), config))
    }

    /// Launch `variant` and start polling its jobs.
    ///
    /// Fails without any network call when the variant's slot is active.
    pub async fn launch_workflow(
        &self,
        variant: WorkflowVariant,
        params: LaunchParams,
    ) -> std::result::Result<WorkflowInvocation, LaunchError> {
        if self.is_shut_down() {
            return Err(LaunchError::ShutDown);
        }

        let (invocation, permit) = self
            .launcher
            .launch(variant, &params, &self.board.guard)
            .await?;
        if self.is_shut_down() {
            let job_ids: Vec<&str> = invocation.job_ids().map(|id| id.as_str()).collect();
            warn!(
                invocation_id = %invocation.invocation_id,
                variant = %variant,
                job_ids = ?job_ids,
                "Torn down during kickoff; accepted jobs will not be polled"
            );
            return Err(LaunchError::ShutDownAfterKickoff { invocation });
        }

        let slot = invocation.slot();
        let coordinator =
            PollCoordinator::new(self.backend.clone(), invocation.clone(), &self.polling);
        {
            let mut states = self.board.states.lock();
            states.insert(slot, coordinator.state());
            permit.commit(invocation.invocation_id);
            self.board.events.publish(OrchestratorEvent::WorkflowLaunched {
                invocation: invocation.clone(),
            });
        }

        {
            let mut runners = self.runners.lock();
            runners.retain(|_, handle| !handle.is_finished());
            let handle = coordinator.spawn(self.polling.interval(), self.board.clone());
            runners.insert(invocation.invocation_id, handle);
        }
        if self.is_shut_down() {
            self.cancel_runners();
        }

        log_workflow_operation(
            "launch",
            &slot.to_string(),
            Some(variant.slug()),
            Some(&invocation.invocation_id.to_string()),
            "running",
            Some(&invocation.description),
        );

        Ok(invocation)
    }

    /// Latest merged state of the slot's most recent invocation
    pub fn current_state(&self, slot: Slot) -> Option<WorkflowState> {
        self.board.states.lock().get(&slot).cloned()
    }

    /// Whether the slot is reserved or being polled
    pub fn is_active(&self, slot: Slot) -> bool {
        self.board.guard.is_active(slot)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.board.events.subscribe()
    }

    /// Stop every runner and refuse further launches; idempotent
    pub fn teardown(&self) {
        let first = !self.shut_down.swap(true, Ordering::SeqCst);
        self.cancel_runners();
        if first {
            info!("Orchestrator torn down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub async fn list_data_sources(&self) -> ClientResult<Vec<DataSourceSummary>> {
        self.backend.list_data_sources().await
    }

    pub async fn task_result(&self, job_id: &JobId) -> ClientResult<TaskResult> {
        self.backend.get_result(job_id).await
    }

    /// Cancel under the state lock so no runner writes after this returns
    fn cancel_runners(&self) {
        let _states = self.board.states.lock();
        for handle in self.runners.lock().values() {
            if !handle.is_cancelled() {
                debug!(slot = %handle.slot(), invocation_id = %handle.invocation_id(), "Cancelling runner");
            }
            handle.cancel();
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::models::{KickoffRequest, KickoffResponse, TaskStatus};
    use crate::state_machine::TaskState;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Hands out `t0`, `t1`, ... as first-stage ids; `t0` succeeds at once
    #[derive(Default)]
    struct SequencedBackend {
        hold_kickoff: bool,
        kickoff_entered: Notify,
        kickoff_release: Notify,
        launches: AtomicUsize,
        polls: Mutex<Vec<String>>,
    }

    impl SequencedBackend {
        fn polls_of(&self, job_id: &str) -> usize {
            self.polls.lock().iter().filter(|id| id.as_str() == job_id).count()
        }
    }

    #[async_trait]
    impl JobBackend for SequencedBackend {
        fn endpoint(&self) -> &str {
            "sequenced"
        }

        async fn launch(
            &self,
            _variant: WorkflowVariant,
            _request: &KickoffRequest,
        ) -> ClientResult<KickoffResponse> {
            let n = self.launches.fetch_add(1, Ordering::SeqCst);
            if self.hold_kickoff {
                self.kickoff_entered.notify_one();
                self.kickoff_release.notified().await;
            }
            Ok(KickoffResponse {
                task_id: Some(JobId::new(format!("t{n}"))),
                ..Default::default()
            })
        }

        async fn get_status(&self, job_id: &JobId) -> ClientResult<TaskStatus> {
            self.polls.lock().push(job_id.to_string());
            let state = if job_id.as_str() == "t0" {
                TaskState::Success
            } else {
                TaskState::Started
            };
            Ok(TaskStatus {
                job_id: job_id.clone(),
                state,
                ready: state.is_terminal(),
                successful: None,
                info: None,
            })
        }

        async fn get_result(&self, job_id: &JobId) -> ClientResult<TaskResult> {
            Err(ClientError::NotReady {
                task_id: job_id.to_string(),
            })
        }

        async fn list_data_sources(&self) -> ClientResult<Vec<DataSourceSummary>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_runner_of_relaunched_slot() {
        let backend = Arc::new(SequencedBackend::default());
        let orchestrator = Orchestrator::new(backend.clone(), OrchestratorConfig::default());
        let mut rx = orchestrator.subscribe();

        let first = orchestrator
            .launch_workflow(WorkflowVariant::ExtractOnly, LaunchParams::default())
            .await
            .unwrap();
        loop {
            match rx.recv().await.unwrap() {
                OrchestratorEvent::WorkflowCompleted { state, .. } => {
                    assert_eq!(state.invocation_id, first.invocation_id);
                    break;
                }
                _ => continue,
            }
        }
        assert!(!orchestrator.is_active(Slot::Extract));

        let second = orchestrator
            .launch_workflow(WorkflowVariant::ExtractOnly, LaunchParams::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(backend.polls_of("t1") >= 1);
        assert!(orchestrator.runners.lock().contains_key(&second.invocation_id));

        orchestrator.teardown();
        assert!(orchestrator
            .runners
            .lock()
            .values()
            .all(PollHandle::is_cancelled));

        let polls = backend.polls_of("t1");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.polls_of("t1"), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_during_kickoff_reports_accepted_invocation() {
        let backend = Arc::new(SequencedBackend {
            hold_kickoff: true,
            ..Default::default()
        });
        let orchestrator = Orchestrator::new(backend.clone(), OrchestratorConfig::default());

        let (result, ()) = tokio::join!(
            orchestrator.launch_workflow(WorkflowVariant::ExtractOnly, LaunchParams::default()),
            async {
                backend.kickoff_entered.notified().await;
                orchestrator.teardown();
                backend.kickoff_release.notify_one();
            }
        );

        match result {
            Err(LaunchError::ShutDownAfterKickoff { invocation }) => {
                assert_eq!(invocation.stages[0].job_id, JobId::from("t0"));
            }
            other => panic!("unexpected launch outcome: {other:?}"),
        }
        assert!(!orchestrator.is_active(Slot::Extract));
        assert!(orchestrator.runners.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.polls_of("t0"), 0);
    }
}
