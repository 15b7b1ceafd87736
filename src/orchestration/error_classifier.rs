//! # Job Failure Classification
//!
//! Sorts a job status into a presentation category. A backing-store
//! connectivity fault is singled out so operators can tell an infrastructure
//! outage apart from a job that failed on its own data.
//!
//! ```rust
//! use etl_orchestrator::models::{JobId, TaskStatus};
//! use etl_orchestrator::orchestration::error_classifier::{FailureCategory, FailureClassifier};
//!
//! let status = TaskStatus::synthetic_failure(
//!     JobId::from("t2"),
//!     "Database connection failed: timeout",
//! );
//! assert_eq!(FailureClassifier::classify(&status), FailureCategory::InfraConnectivity);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::signatures;
use crate::models::TaskStatus;

/// Presentation category of a job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The backend could not reach its database
    InfraConnectivity,
    /// The job failed for any other reason
    GenericFailure,
    #[default]
    None,
}

impl FailureCategory {
    /// Short human-facing hint for the category
    pub fn label(&self) -> &'static str {
        match self {
            Self::InfraConnectivity => "Database connection failed",
            Self::GenericFailure => "Failed",
            Self::None => "",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InfraConnectivity => write!(f, "infra_connectivity"),
            Self::GenericFailure => write!(f, "generic_failure"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Stateless classifier over job statuses
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureClassifier;

impl FailureClassifier {
    /// Classify a status.
    ///
    /// The connectivity signature is looked up in `info.error` first, then in
    /// `info.message`, regardless of state.
    pub fn classify(status: &TaskStatus) -> FailureCategory {
        let infra = status.info.as_ref().is_some_and(|info| {
            [info.error(), info.message()]
                .into_iter()
                .flatten()
                .any(contains_connectivity_signature)
        });

        if infra {
            FailureCategory::InfraConnectivity
        } else if status.is_failure() {
            FailureCategory::GenericFailure
        } else {
            FailureCategory::None
        }
    }
}

fn contains_connectivity_signature(text: &str) -> bool {
    text.to_lowercase()
        .contains(signatures::DATABASE_CONNECTION_FAILED)
}
