//! Shared test infrastructure: a scripted in-memory job backend.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use etl_orchestrator::client::JobBackend;
use etl_orchestrator::error::{ClientError, ClientResult};
use etl_orchestrator::models::{
    DataSourceSummary, JobId, KickoffRequest, KickoffResponse, TaskInfo, TaskResult, TaskStatus,
    WorkflowVariant,
};
use etl_orchestrator::state_machine::TaskState;

/// One scripted answer of the status endpoint
#[derive(Debug, Clone)]
pub enum Poll {
    State(TaskState, Option<Value>),
    Http(u16, &'static str),
}

impl Poll {
    pub fn state(state: TaskState) -> Self {
        Poll::State(state, None)
    }

    pub fn with_info(state: TaskState, info: Value) -> Self {
        Poll::State(state, Some(info))
    }
}

/// Scripted backend; each job replays its queue and repeats the last entry
#[derive(Default)]
pub struct MockBackend {
    kickoff: Mutex<Option<KickoffResponse>>,
    polls: Mutex<HashMap<String, VecDeque<Poll>>>,
    sources: Mutex<Vec<DataSourceSummary>>,
    pub launch_calls: AtomicUsize,
    pub status_calls: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<(WorkflowVariant, KickoffRequest)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kickoff(self, response: KickoffResponse) -> Self {
        *self.kickoff.lock() = Some(response);
        self
    }

    pub fn with_polls(self, job_id: &str, polls: Vec<Poll>) -> Self {
        self.polls.lock().insert(job_id.to_string(), polls.into());
        self
    }

    pub fn with_source(self, name: &str) -> Self {
        let mut sources = self.sources.lock();
        let source_id = sources.len() as i64 + 1;
        sources.push(DataSourceSummary {
            source_id,
            name: name.to_string(),
            ..Default::default()
        });
        drop(sources);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn launches(&self) -> usize {
        self.launch_calls.load(Ordering::SeqCst)
    }

    pub fn polls_of(&self, job_id: &str) -> usize {
        self.status_calls
            .lock()
            .iter()
            .filter(|id| id.as_str() == job_id)
            .count()
    }

    pub fn total_polls(&self) -> usize {
        self.status_calls.lock().len()
    }

    fn next_poll(&self, job_id: &str) -> Poll {
        let mut polls = self.polls.lock();
        match polls.get_mut(job_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Poll::state(TaskState::Pending)),
            Some(queue) => queue.front().cloned().unwrap_or(Poll::state(TaskState::Pending)),
            None => Poll::state(TaskState::Pending),
        }
    }
}

#[async_trait]
impl JobBackend for MockBackend {
    fn endpoint(&self) -> &str {
        "mock://backend"
    }

    async fn launch(
        &self,
        variant: WorkflowVariant,
        request: &KickoffRequest,
    ) -> ClientResult<KickoffResponse> {
        self.launch_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((variant, request.clone()));
        self.kickoff
            .lock()
            .clone()
            .ok_or_else(|| ClientError::api_error(503, "Failed to start workflow"))
    }

    async fn get_status(&self, job_id: &JobId) -> ClientResult<TaskStatus> {
        self.status_calls.lock().push(job_id.to_string());
        match self.next_poll(job_id.as_str()) {
            Poll::State(state, info) => Ok(TaskStatus {
                job_id: job_id.clone(),
                state,
                ready: state.is_terminal(),
                successful: state.is_terminal().then_some(state == TaskState::Success),
                info: info.map(TaskInfo::from),
            }),
            Poll::Http(status, body) => Err(ClientError::api_error(status, body)),
        }
    }

    async fn get_result(&self, job_id: &JobId) -> ClientResult<TaskResult> {
        Err(ClientError::NotReady {
            task_id: job_id.to_string(),
        })
    }

    async fn list_data_sources(&self) -> ClientResult<Vec<DataSourceSummary>> {
        Ok(self.sources.lock().clone())
    }
}

/// Kickoff response carrying the given stage ids
pub fn kickoff(extract: Option<&str>, transform: Option<&str>, load: Option<&str>) -> KickoffResponse {
    KickoffResponse {
        extract_task_id: extract.map(JobId::from),
        transform_task_id: transform.map(JobId::from),
        load_task_id: load.map(JobId::from),
        ..Default::default()
    }
}
