use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::task_status::JobId;

/// Position of a backend job inside a workflow invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extract => write!(f, "extract"),
            Self::Transform => write!(f, "transform"),
            Self::Load => write!(f, "load"),
        }
    }
}

/// Tracking bucket protected against concurrent re-launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Extract, extract+transform and full pipeline runs
    Extract,
    /// Lone transform or load runs
    TransformLoad,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Extract, Slot::TransformLoad];
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extract => write!(f, "extract"),
            Self::TransformLoad => write!(f, "transform_load"),
        }
    }
}

/// Named workflow shapes the backend can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowVariant {
    ExtractOnly,
    ExtractThenTransform,
    ExtractTransformLoad,
    TransformOnly,
    LoadOnly,
}

impl WorkflowVariant {
    pub const ALL: [WorkflowVariant; 5] = [
        WorkflowVariant::ExtractOnly,
        WorkflowVariant::ExtractThenTransform,
        WorkflowVariant::ExtractTransformLoad,
        WorkflowVariant::TransformOnly,
        WorkflowVariant::LoadOnly,
    ];

    /// Path segment appended to the kickoff endpoint
    pub fn slug(&self) -> &'static str {
        match self {
            Self::ExtractOnly => "extract-only",
            Self::ExtractThenTransform => "extract-then-transform",
            Self::ExtractTransformLoad => "extract-transform-load",
            Self::TransformOnly => "transform-only",
            Self::LoadOnly => "load-only",
        }
    }

    pub fn slot(&self) -> Slot {
        match self {
            Self::ExtractOnly | Self::ExtractThenTransform | Self::ExtractTransformLoad => {
                Slot::Extract
            }
            Self::TransformOnly | Self::LoadOnly => Slot::TransformLoad,
        }
    }

    /// Stages the backend may spawn for this variant, in pipeline order
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            Self::ExtractOnly => &[Stage::Extract],
            Self::ExtractThenTransform => &[Stage::Extract, Stage::Transform],
            Self::ExtractTransformLoad => &[Stage::Extract, Stage::Transform, Stage::Load],
            Self::TransformOnly => &[Stage::Transform],
            Self::LoadOnly => &[Stage::Load],
        }
    }

    pub fn first_stage(&self) -> Stage {
        self.stages()[0]
    }

    pub fn includes_extract(&self) -> bool {
        self.stages().contains(&Stage::Extract)
    }

    fn chains_transform(&self) -> bool {
        matches!(self, Self::ExtractThenTransform | Self::ExtractTransformLoad)
    }

    fn chains_load(&self) -> bool {
        matches!(self, Self::ExtractTransformLoad)
    }
}

impl fmt::Display for WorkflowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for WorkflowVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "extract-only" | "extract" => Ok(Self::ExtractOnly),
            "extract-then-transform" | "extract-transform" => Ok(Self::ExtractThenTransform),
            "extract-transform-load" | "etl" => Ok(Self::ExtractTransformLoad),
            "transform-only" | "transform" => Ok(Self::TransformOnly),
            "load-only" | "load" => Ok(Self::LoadOnly),
            _ => Err(format!("Invalid workflow variant: {s}")),
        }
    }
}

/// Caller-supplied options for a workflow launch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchParams {
    /// Rebuild rows that were already processed
    #[serde(default)]
    pub force_reprocess: bool,
    /// Restrict processing to these users
    #[serde(default)]
    pub user_ids: Option<Vec<i64>>,
    /// Inclusive lower bound on record day
    #[serde(default)]
    pub since: Option<NaiveDate>,
    /// Inclusive upper bound on record day
    #[serde(default)]
    pub until: Option<NaiveDate>,
    #[serde(default)]
    pub extract_queue: Option<String>,
    #[serde(default)]
    pub transform_queue: Option<String>,
    #[serde(default)]
    pub load_queue: Option<String>,
}

/// Body of POST /tasks/run/<slug>
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KickoffRequest {
    pub chain_transform: bool,
    pub chain_load: bool,
    pub force_reprocess: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_extract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_transform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_load: Option<String>,
}

impl KickoffRequest {
    pub fn for_variant(variant: WorkflowVariant, params: &LaunchParams) -> Self {
        Self {
            chain_transform: variant.chains_transform(),
            chain_load: variant.chains_load(),
            force_reprocess: params.force_reprocess,
            user_ids: params.user_ids.clone(),
            since: params.since,
            until: params.until,
            queue_extract: params.extract_queue.clone(),
            queue_transform: params.transform_queue.clone(),
            queue_load: params.load_queue.clone(),
        }
    }
}

/// Response of a kickoff call
///
/// Only the ids the backend actually returned are tracked; `final_task_id`
/// repeats the last chained id and is informational.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KickoffResponse {
    #[serde(default)]
    pub workflow: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extract_task_id: Option<JobId>,
    #[serde(default)]
    pub transform_task_id: Option<JobId>,
    #[serde(default)]
    pub load_task_id: Option<JobId>,
    /// Single-stage endpoints answer with a bare `task_id`
    #[serde(default)]
    pub task_id: Option<JobId>,
    #[serde(default)]
    pub final_task_id: Option<JobId>,
}

impl KickoffResponse {
    /// Stage-ordered job ids, skipping null or empty fields
    pub fn tracked_stages(&self, variant: WorkflowVariant) -> Vec<TrackedStage> {
        let mut stages: Vec<TrackedStage> = [
            (Stage::Extract, &self.extract_task_id),
            (Stage::Transform, &self.transform_task_id),
            (Stage::Load, &self.load_task_id),
        ]
        .into_iter()
        .filter_map(|(stage, id)| {
            id.as_ref()
                .filter(|id| !id.as_str().is_empty())
                .map(|id| TrackedStage::new(stage, id.clone()))
        })
        .collect();

        if let Some(id) = self.task_id.as_ref().filter(|id| !id.as_str().is_empty()) {
            let first = variant.first_stage();
            let already_tracked = stages
                .iter()
                .any(|tracked| tracked.stage == first || &tracked.job_id == id);
            if !already_tracked {
                stages.push(TrackedStage::new(first, id.clone()));
                stages.sort_by_key(|tracked| tracked.stage);
            }
        }

        stages
    }
}

/// One backend job tracked by an invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedStage {
    pub stage: Stage,
    pub job_id: JobId,
}

impl TrackedStage {
    pub fn new(stage: Stage, job_id: JobId) -> Self {
        Self { stage, job_id }
    }
}

/// One run of a named workflow, tracked as its backend job ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInvocation {
    pub invocation_id: Uuid,
    pub variant: WorkflowVariant,
    pub stages: Vec<TrackedStage>,
    pub description: String,
    pub launched_at: DateTime<Utc>,
}

impl WorkflowInvocation {
    pub fn new(variant: WorkflowVariant, stages: Vec<TrackedStage>, description: String) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            variant,
            stages,
            description,
            launched_at: Utc::now(),
        }
    }

    pub fn slot(&self) -> Slot {
        self.variant.slot()
    }

    pub fn job_ids(&self) -> impl Iterator<Item = &JobId> {
        self.stages.iter().map(|tracked| &tracked.job_id)
    }
}
