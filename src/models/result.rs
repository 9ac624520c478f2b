//! Per-directory attempt outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one attempt against one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryOutcome {
    Pending,
    Submitted,
    Skipped,
    Failed,
}

impl DirectoryOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DirectoryOutcome::Pending)
    }
}

/// Structured trace of what an attempt did, kept alongside the outcome so a
/// failed or skipped directory is always explainable after the fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseLog {
    /// Resolution tier per bound field, e.g. `"phone: catalog"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<String>,
    /// Selectors that were tried and did not resolve.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors_tried: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether a failure is worth re-driving. Skips are never retryable.
    #[serde(default)]
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl ResponseLog {
    pub fn error(detail: impl Into<String>, retryable: bool) -> Self {
        Self {
            error: Some(detail.into()),
            retryable,
            ..Default::default()
        }
    }
}

/// The recorded outcome of one directory within a job. Retries update the
/// row in place and bump `attempt_count`; the (job, directory) pair is never
/// duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryResult {
    pub directory: String,
    pub outcome: DirectoryOutcome,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default)]
    pub log: ResponseLog,
    pub last_attempt_at: DateTime<Utc>,
}

impl DirectoryResult {
    pub fn new(directory: impl Into<String>, outcome: DirectoryOutcome, log: ResponseLog) -> Self {
        Self {
            directory: directory.into(),
            outcome,
            attempt_count: 1,
            log,
            last_attempt_at: Utc::now(),
        }
    }

    /// True when `other` carries no new information, so re-applying it must
    /// leave the stored row untouched.
    pub fn same_observation(&self, other: &DirectoryResult) -> bool {
        self.outcome == other.outcome && self.log == other.log
    }
}
