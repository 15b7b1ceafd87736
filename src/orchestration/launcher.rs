//! # Workflow Launcher
//!
//! Turns a [`WorkflowVariant`] into a kickoff call and a [`WorkflowInvocation`].
//! The slot is reserved before any network traffic and released again if the
//! launch does not produce a trackable invocation.

use std::sync::Arc;
use tracing::{info, warn};

use super::guard::{SlotGuard, SlotPermit};
use crate::client::JobBackend;
use crate::config::LaunchConfig;
use crate::error::LaunchError;
use crate::logging::log_workflow_operation;
use crate::models::{KickoffRequest, LaunchParams, WorkflowInvocation, WorkflowVariant};

/// Kickoff front-end over a [`JobBackend`]
#[derive(Clone)]
pub struct WorkflowLauncher {
    backend: Arc<dyn JobBackend>,
    config: LaunchConfig,
}

impl std::fmt::Debug for WorkflowLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowLauncher")
            .field("endpoint", &self.backend.endpoint())
            .field("config", &self.config)
            .finish()
    }
}

impl WorkflowLauncher {
    pub fn new(backend: Arc<dyn JobBackend>, config: LaunchConfig) -> Self {
        Self { backend, config }
    }

    /// Launch `variant`, returning the invocation and its slot permit.
    ///
    /// The permit is still in the `Launching` state; the caller commits it
    /// once the invocation is being tracked.
    pub async fn launch(
        &self,
        variant: WorkflowVariant,
        params: &LaunchParams,
        guard: &SlotGuard,
    ) -> Result<(WorkflowInvocation, SlotPermit), LaunchError> {
        let slot = variant.slot();
        let permit = match guard.try_reserve(slot) {
            Ok(permit) => permit,
            Err(e) => {
                warn!(slot = %slot, variant = %variant, "Launch rejected: slot busy");
                return Err(e);
            }
        };

        if self.config.require_data_sources && variant.includes_extract() {
            let sources = self
                .backend
                .list_data_sources()
                .await
                .map_err(LaunchError::Precheck)?;
            if sources.is_empty() {
                warn!(variant = %variant, "Launch rejected: no data sources configured");
                return Err(LaunchError::NoDataSources);
            }
        }

        let request = KickoffRequest::for_variant(variant, params);
        let response = match self.backend.launch(variant, &request).await {
            Ok(response) => response,
            Err(e) => {
                log_workflow_operation(
                    "kickoff",
                    &slot.to_string(),
                    Some(variant.slug()),
                    None,
                    "failed",
                    Some(&e.to_string()),
                );
                return Err(LaunchError::Kickoff(e));
            }
        };

        let stages = response.tracked_stages(variant);
        if stages.is_empty() {
            warn!(variant = %variant, "Kickoff response carried no job ids");
            return Err(LaunchError::NoJobIds { variant });
        }

        let description = response
            .description
            .clone()
            .unwrap_or_else(|| variant.slug().to_string());
        let invocation = WorkflowInvocation::new(variant, stages, description);

        info!(
            slot = %slot,
            variant = %variant,
            invocation_id = %invocation.invocation_id,
            jobs = invocation.stages.len(),
            "Workflow kicked off"
        );

        Ok((invocation, permit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, ClientResult};
    use crate::models::{
        DataSourceSummary, JobId, KickoffResponse, Slot, Stage, TaskResult, TaskStatus,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedKickoff {
        response: Option<KickoffResponse>,
        /// `None` makes the data source listing fail
        sources: Option<usize>,
        launches: AtomicUsize,
    }

    impl ScriptedKickoff {
        fn new(response: Option<KickoffResponse>, sources: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                response,
                sources,
                launches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl JobBackend for ScriptedKickoff {
        fn endpoint(&self) -> &str {
            "scripted"
        }

        async fn launch(
            &self,
            _variant: WorkflowVariant,
            _request: &KickoffRequest,
        ) -> ClientResult<KickoffResponse> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            self.response
                .clone()
                .ok_or_else(|| ClientError::api_error(500, "broker unavailable"))
        }

        async fn get_status(&self, job_id: &JobId) -> ClientResult<TaskStatus> {
            Ok(TaskStatus::pending(job_id.clone()))
        }

        async fn get_result(&self, job_id: &JobId) -> ClientResult<TaskResult> {
            Err(ClientError::NotReady {
                task_id: job_id.to_string(),
            })
        }

        async fn list_data_sources(&self) -> ClientResult<Vec<DataSourceSummary>> {
            let count = self
                .sources
                .ok_or_else(|| ClientError::api_error(503, "catalog unavailable"))?;
            Ok((0..count)
                .map(|i| DataSourceSummary {
                    source_id: i as i64,
                    name: format!("source-{i}"),
                    ..Default::default()
                })
                .collect())
        }
    }

    fn launcher(backend: &Arc<ScriptedKickoff>, require_data_sources: bool) -> WorkflowLauncher {
        WorkflowLauncher::new(
            backend.clone(),
            LaunchConfig {
                require_data_sources,
            },
        )
    }

    #[tokio::test]
    async fn test_successful_launch_keeps_reservation() {
        let backend = ScriptedKickoff::new(
            Some(KickoffResponse {
                extract_task_id: Some(JobId::from("t1")),
                transform_task_id: Some(JobId::from("t2")),
                ..Default::default()
            }),
            Some(1),
        );
        let guard = SlotGuard::new();

        let (invocation, permit) = launcher(&backend, false)
            .launch(WorkflowVariant::ExtractThenTransform, &LaunchParams::default(), &guard)
            .await
            .unwrap();

        assert_eq!(invocation.stages.len(), 2);
        assert_eq!(invocation.stages[1].stage, Stage::Transform);
        assert_eq!(invocation.description, "extract-then-transform");
        assert!(guard.is_active(Slot::Extract));
        permit.commit(invocation.invocation_id);
        assert!(guard.is_active(Slot::Extract));
    }

    #[tokio::test]
    async fn test_busy_slot_makes_no_call() {
        let backend = ScriptedKickoff::new(None, Some(1));
        let guard = SlotGuard::new();
        let _held = guard.try_reserve(Slot::TransformLoad).unwrap();

        let err = launcher(&backend, false)
            .launch(WorkflowVariant::LoadOnly, &LaunchParams::default(), &guard)
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::SlotBusy { slot: Slot::TransformLoad }));
        assert_eq!(backend.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_kickoff_releases_slot() {
        let backend = ScriptedKickoff::new(None, Some(1));
        let guard = SlotGuard::new();

        let err = launcher(&backend, false)
            .launch(WorkflowVariant::ExtractOnly, &LaunchParams::default(), &guard)
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::Kickoff(ClientError::ApiError { status: 500, .. })));
        assert!(!guard.is_active(Slot::Extract));
    }

    #[tokio::test]
    async fn test_response_without_ids_is_rejected() {
        let backend = ScriptedKickoff::new(Some(KickoffResponse::default()), Some(1));
        let guard = SlotGuard::new();

        let err = launcher(&backend, false)
            .launch(WorkflowVariant::TransformOnly, &LaunchParams::default(), &guard)
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::NoJobIds { variant: WorkflowVariant::TransformOnly }));
        assert!(!guard.is_active(Slot::TransformLoad));
    }

    #[tokio::test]
    async fn test_data_source_precheck() {
        let backend = ScriptedKickoff::new(
            Some(KickoffResponse {
                task_id: Some(JobId::from("t1")),
                ..Default::default()
            }),
            Some(0),
        );
        let guard = SlotGuard::new();
        let launcher = launcher(&backend, true);

        let err = launcher
            .launch(WorkflowVariant::ExtractOnly, &LaunchParams::default(), &guard)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::NoDataSources));
        assert_eq!(backend.launches.load(Ordering::SeqCst), 0);
        assert!(!guard.is_active(Slot::Extract));

        // Variants without an extract stage skip the precheck
        let (invocation, _permit) = launcher
            .launch(WorkflowVariant::LoadOnly, &LaunchParams::default(), &guard)
            .await
            .unwrap();
        assert_eq!(invocation.stages[0].stage, Stage::Load);
    }

    #[tokio::test]
    async fn test_precheck_transport_error_is_not_a_kickoff_error() {
        let backend = ScriptedKickoff::new(
            Some(KickoffResponse {
                task_id: Some(JobId::from("t1")),
                ..Default::default()
            }),
            None,
        );
        let guard = SlotGuard::new();

        let err = launcher(&backend, true)
            .launch(WorkflowVariant::ExtractOnly, &LaunchParams::default(), &guard)
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::Precheck(ClientError::ApiError { status: 503, .. })));
        assert!(err.to_string().starts_with("Data source check failed"));
        assert_eq!(backend.launches.load(Ordering::SeqCst), 0);
        assert!(!guard.is_active(Slot::Extract));
    }
}
