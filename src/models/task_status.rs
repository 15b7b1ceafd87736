use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use tracing::warn;

use crate::state_machine::TaskState;

/// Opaque backend job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Free-form progress payload attached to a job status
///
/// Jobs report whatever they like here; the accessors pick out the fields the
/// orchestrator understands and ignore the rest. A non-object payload is kept
/// as `{"message": <text>}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "JsonValue", into = "JsonValue")]
pub struct TaskInfo {
    fields: Map<String, JsonValue>,
}

impl TaskInfo {
    /// Build an info payload carrying only a message
    pub fn with_message(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("message".to_string(), JsonValue::String(message.into()));
        Self { fields }
    }

    /// Percent complete; extract jobs report `percent`, transform/load report `progress`
    pub fn percent(&self) -> Option<f64> {
        self.number("percent").or_else(|| self.number("progress"))
    }

    pub fn processed(&self) -> Option<f64> {
        self.number("processed")
            .or_else(|| self.number("processed_records"))
    }

    pub fn total(&self) -> Option<f64> {
        self.number("total").or_else(|| self.number("total_records"))
    }

    pub fn message(&self) -> Option<&str> {
        self.text("message")
    }

    pub fn error(&self) -> Option<&str> {
        self.text("error")
    }

    /// Named phase inside a job (e.g. "initializing", "processing")
    pub fn step(&self) -> Option<&str> {
        self.text("step")
    }

    /// Raw access for fields without a typed accessor
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.fields
            .get(key)
            .and_then(JsonValue::as_f64)
            .filter(|n| n.is_finite())
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(JsonValue::as_str)
    }
}

impl From<JsonValue> for TaskInfo {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(fields) => Self { fields },
            JsonValue::Null => Self::default(),
            JsonValue::String(text) => Self::with_message(text),
            other => Self::with_message(other.to_string()),
        }
    }
}

impl From<TaskInfo> for JsonValue {
    fn from(info: TaskInfo) -> Self {
        JsonValue::Object(info.fields)
    }
}

/// Status record for one backend job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(rename = "task_id")]
    pub job_id: JobId,
    pub state: TaskState,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub successful: Option<bool>,
    #[serde(default)]
    pub info: Option<TaskInfo>,
}

impl TaskStatus {
    /// Status assumed for a job before its first successful poll
    pub fn pending(job_id: JobId) -> Self {
        Self {
            job_id,
            state: TaskState::Pending,
            ready: false,
            successful: None,
            info: None,
        }
    }

    /// Terminal failure standing in for a status that could not be fetched
    pub fn synthetic_failure(job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            job_id,
            state: TaskState::Failure,
            ready: true,
            successful: Some(false),
            info: Some(TaskInfo::with_message(message)),
        }
    }

    /// Enforce `ready == state.is_terminal()` and `successful` only when ready.
    ///
    /// The state string wins over the backend's flags when they disagree.
    pub fn normalized(mut self) -> Self {
        let ready = self.state.is_terminal();
        if self.ready != ready {
            warn!(
                job_id = %self.job_id,
                state = %self.state,
                reported_ready = self.ready,
                "Backend ready flag disagrees with state; using state"
            );
        }
        self.ready = ready;
        self.successful = ready.then_some(self.state == TaskState::Success);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_failure(&self) -> bool {
        self.state.is_error()
    }
}

/// Final payload of a finished job (GET /tasks/{id}/result)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(rename = "task_id")]
    pub job_id: JobId,
    pub state: TaskState,
    #[serde(default)]
    pub result: JsonValue,
}
