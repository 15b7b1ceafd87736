use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ClientResult;
use crate::models::{
    DataSourceSummary, JobId, KickoffRequest, KickoffResponse, TaskResult, TaskStatus,
    WorkflowVariant,
};

/// Job-control API consumed by the orchestrator.
///
/// The REST implementation is [`super::HttpJobBackend`]; decorators such as
/// [`super::AuthPolicyBackend`] wrap any other implementation, and tests plug
/// in scripted backends.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Endpoint description for debugging/logging
    fn endpoint(&self) -> &str;

    /// POST /tasks/run/<slug>
    async fn launch(
        &self,
        variant: WorkflowVariant,
        request: &KickoffRequest,
    ) -> ClientResult<KickoffResponse>;

    /// GET /tasks/{id}/status
    async fn get_status(&self, job_id: &JobId) -> ClientResult<TaskStatus>;

    /// GET /tasks/{id}/result
    async fn get_result(&self, job_id: &JobId) -> ClientResult<TaskResult>;

    /// GET /datasets/sources
    async fn list_data_sources(&self) -> ClientResult<Vec<DataSourceSummary>>;
}

#[async_trait]
impl<T: JobBackend + ?Sized> JobBackend for Arc<T> {
    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }

    async fn launch(
        &self,
        variant: WorkflowVariant,
        request: &KickoffRequest,
    ) -> ClientResult<KickoffResponse> {
        (**self).launch(variant, request).await
    }

    async fn get_status(&self, job_id: &JobId) -> ClientResult<TaskStatus> {
        (**self).get_status(job_id).await
    }

    async fn get_result(&self, job_id: &JobId) -> ClientResult<TaskResult> {
        (**self).get_result(job_id).await
    }

    async fn list_data_sources(&self) -> ClientResult<Vec<DataSourceSummary>> {
        (**self).list_data_sources().await
    }
}
