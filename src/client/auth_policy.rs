//! Authorization-failure policy as a backend decorator.
//!
//! Every call is delegated unchanged; when the backend answers 401 or 403 the
//! injected handler is told before the error is returned to the caller.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::traits::JobBackend;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    DataSourceSummary, JobId, KickoffRequest, KickoffResponse, TaskResult, TaskStatus,
    WorkflowVariant,
};

/// Receiver for authorization failures (e.g. to prompt for a new session)
pub trait AuthFailureHandler: Send + Sync {
    fn on_auth_failure(&self, operation: &'static str, status: u16);
}

impl<F> AuthFailureHandler for F
where
    F: Fn(&'static str, u16) + Send + Sync,
{
    fn on_auth_failure(&self, operation: &'static str, status: u16) {
        self(operation, status)
    }
}

/// Decorator applying the authorization-failure policy to any backend
pub struct AuthPolicyBackend<B> {
    inner: B,
    handler: Arc<dyn AuthFailureHandler>,
}

impl<B: JobBackend> AuthPolicyBackend<B> {
    pub fn new(inner: B, handler: Arc<dyn AuthFailureHandler>) -> Self {
        Self { inner, handler }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn observe<T>(&self, operation: &'static str, result: ClientResult<T>) -> ClientResult<T> {
        if let Err(e @ ClientError::ApiError { status, .. }) = &result {
            if e.is_auth_failure() {
                warn!(
                    operation = %operation,
                    status = *status,
                    endpoint = %self.inner.endpoint(),
                    "Backend rejected credentials"
                );
                self.handler.on_auth_failure(operation, *status);
            }
        }
        result
    }
}

impl<B> std::fmt::Debug for AuthPolicyBackend<B>
where
    B: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPolicyBackend")
            .field("inner", &self.inner)
            .finish()
    }
}

#[async_trait]
impl<B: JobBackend> JobBackend for AuthPolicyBackend<B> {
    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    async fn launch(
        &self,
        variant: WorkflowVariant,
        request: &KickoffRequest,
    ) -> ClientResult<KickoffResponse> {
        let result = self.inner.launch(variant, request).await;
        self.observe("launch", result)
    }

    async fn get_status(&self, job_id: &JobId) -> ClientResult<TaskStatus> {
        let result = self.inner.get_status(job_id).await;
        self.observe("get_status", result)
    }

    async fn get_result(&self, job_id: &JobId) -> ClientResult<TaskResult> {
        let result = self.inner.get_result(job_id).await;
        self.observe("get_result", result)
    }

    async fn list_data_sources(&self) -> ClientResult<Vec<DataSourceSummary>> {
        let result = self.inner.list_data_sources().await;
        self.observe("list_data_sources", result)
    }
}
