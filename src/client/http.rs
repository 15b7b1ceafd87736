//! # Job Backend REST Client
//!
//! HTTP client for the job-control API: workflow kickoff, per-job status and
//! result lookups, and the data source listing.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::traits::JobBackend;
use crate::config::BackendConfig;
use crate::constants::endpoints;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    DataSourceList, DataSourceSummary, JobId, KickoffRequest, KickoffResponse, TaskResult,
    TaskStatus, WorkflowVariant,
};

/// HTTP client for communicating with the job backend
///
/// Kickoff is sent exactly once. Status lookups are sent exactly once per call
/// so the poll loop decides what a failure means. Only the idempotent reads
/// (`get_result`, `list_data_sources`) retry server and network errors.
///
/// # Examples
///
/// ```rust
/// use etl_orchestrator::client::HttpJobBackend;
/// use etl_orchestrator::config::BackendConfig;
///
/// let backend = HttpJobBackend::new(&BackendConfig::default()).unwrap();
/// assert_eq!(backend.base_url(), "http://localhost:5000/");
/// ```
#[derive(Clone)]
pub struct HttpJobBackend {
    client: Client,
    config: BackendConfig,
    base_url: Url,
}

impl std::fmt::Debug for HttpJobBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJobBackend")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.config.timeout_ms)
            .field("max_retries", &self.config.max_retries)
            .field(
                "auth_enabled",
                &(self.config.bearer_token.is_some() || self.config.api_key.is_some()),
            )
            .finish()
    }
}

impl HttpJobBackend {
    /// Create a new backend client, validating the base URL and credentials
    pub fn new(config: &BackendConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::ConfigError(format!("Invalid base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::ConfigError(format!(
                "Base URL cannot carry paths: {}",
                config.base_url
            )));
        }

        let mut client_builder = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("etl-orchestrator/{}", env!("CARGO_PKG_VERSION")));

        let mut default_headers = reqwest::header::HeaderMap::new();

        // Priority: bearer_token > api_key
        if let Some(token) = config.bearer_token.as_deref().filter(|t| !t.is_empty()) {
            default_headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", token)
                    .parse()
                    .map_err(|e| ClientError::ConfigError(format!("Invalid bearer token: {}", e)))?,
            );
            debug!("Configured Bearer token authentication");
        } else if let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            default_headers.insert(
                reqwest::header::HeaderName::from_bytes(config.api_key_header.as_bytes()).map_err(
                    |e| ClientError::ConfigError(format!("Invalid API key header name: {}", e)),
                )?,
                api_key
                    .parse()
                    .map_err(|e| ClientError::ConfigError(format!("Invalid API key: {}", e)))?,
            );
            debug!(
                header = %config.api_key_header,
                "Configured API key authentication"
            );
        }

        if !default_headers.is_empty() {
            client_builder = client_builder.default_headers(default_headers);
        }

        let client = client_builder
            .build()
            .map_err(|e| ClientError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            auth_enabled = config.bearer_token.is_some() || config.api_key.is_some(),
            "Created job backend client"
        );

        Ok(Self {
            client,
            config: config.clone(),
            base_url,
        })
    }

    /// Get the configured base URL for debugging/logging
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Get the configured timeout for debugging/logging
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.config.timeout_ms
    }

    /// Append percent-encoded segments to the base URL, keeping any base path
    fn url_for(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::ConfigError("Failed to construct URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn handle_response<T>(&self, response: Response, operation: &str) -> ClientResult<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            serde_json::from_str::<T>(&body).map_err(|e| {
                error!(operation = %operation, error = %e, "Failed to parse response");
                ClientError::invalid_response(operation, e.to_string())
            })
        } else {
            warn!(
                operation = %operation,
                status = %status,
                error = %body,
                "Backend returned error status"
            );
            Err(ClientError::api_error(status.as_u16(), body))
        }
    }

    /// Retry recoverable failures of an idempotent read with exponential backoff
    async fn with_retries<T, F, Fut>(&self, operation: &str, mut call: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut retries = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_recoverable() && retries < self.config.max_retries => {
                    retries += 1;
                    // Exponential backoff: 1s, 2s, 4s, ...
                    let delay = Duration::from_secs(1 << (retries - 1).min(5));
                    warn!(
                        operation = %operation,
                        error = %e,
                        retry = retries,
                        max_retries = self.config.max_retries,
                        "Recoverable error, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl JobBackend for HttpJobBackend {
    fn endpoint(&self) -> &str {
        self.base_url.as_str()
    }

    async fn launch(
        &self,
        variant: WorkflowVariant,
        request: &KickoffRequest,
    ) -> ClientResult<KickoffResponse> {
        let mut segments = endpoints::RUN.to_vec();
        segments.push(variant.slug());
        let url = self.url_for(&segments)?;

        debug!(url = %url, variant = %variant, "Launching workflow via job backend");

        let response = self.client.post(url).json(request).send().await?;
        let kickoff: KickoffResponse = self.handle_response(response, "launch workflow").await?;

        info!(
            variant = %variant,
            workflow = ?kickoff.workflow,
            "Job backend accepted workflow kickoff"
        );
        Ok(kickoff)
    }

    async fn get_status(&self, job_id: &JobId) -> ClientResult<TaskStatus> {
        let url = self.url_for(&[endpoints::TASKS, job_id.as_str(), endpoints::STATUS])?;

        debug!(url = %url, job_id = %job_id, "Getting job status");

        let response = self.client.get(url).send().await?;
        let status: TaskStatus = self.handle_response(response, "get job status").await?;
        Ok(status.normalized())
    }

    async fn get_result(&self, job_id: &JobId) -> ClientResult<TaskResult> {
        let url = self.url_for(&[endpoints::TASKS, job_id.as_str(), endpoints::RESULT])?;
        let url = &url;

        self.with_retries("get job result", || async move {
            debug!(url = %url, job_id = %job_id, "Getting job result");
            let response = self.client.get(url.clone()).send().await?;
            if response.status() == StatusCode::CONFLICT {
                return Err(ClientError::NotReady {
                    task_id: job_id.to_string(),
                });
            }
            self.handle_response(response, "get job result").await
        })
        .await
    }

    async fn list_data_sources(&self) -> ClientResult<Vec<DataSourceSummary>> {
        let url = self.url_for(&endpoints::DATA_SOURCES)?;
        let url = &url;

        let list: DataSourceList = self
            .with_retries("list data sources", || async move {
                debug!(url = %url, "Listing data sources");
                let response = self.client.get(url.clone()).send().await?;
                self.handle_response(response, "list data sources").await
            })
            .await?;

        Ok(list.items)
    }
}
