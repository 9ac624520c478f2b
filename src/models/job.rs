//! Job records and the leasing vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::BusinessProfile;

/// Lifecycle of a job inside the lease store.
///
/// `Pending → Leased` on claim, `Leased → Pending` only on lease expiry,
/// `Complete` / `Failed` are terminal (an operator `retry` is the one escape
/// hatch from `Failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Leased,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// A time-bounded, token-guarded claim by one worker on one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub token: Uuid,
    pub worker_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Terminal accounting for a job. Counts always sum to the job's
/// directory count once the job is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub submitted: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl JobSummary {
    pub fn total(&self) -> usize {
        self.submitted + self.failed + self.skipped
    }
}

/// What a worker is willing to take on. Jobs whose directory list exceeds
/// `max_directories` are passed over during claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_directories: Option<usize>,
}

/// One customer's unit of work: the profile to submit plus the directories
/// to submit it to. Created externally when a purchase is fulfilled; never
/// physically deleted, only moved through `JobStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub customer_id: String,
    /// Lower tier is claimed first.
    pub priority: i32,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub profile: BusinessProfile,
    pub directories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<JobSummary>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Job {
    /// New pending job, as handed over by the fulfillment collaborator.
    pub fn new(
        id: impl Into<String>,
        customer_id: impl Into<String>,
        priority: i32,
        profile: BusinessProfile,
        directories: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            priority,
            status: JobStatus::Pending,
            lease: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            profile,
            directories,
            summary: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Package size sold to the customer.
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    pub fn holds_valid_lease(&self, token: Uuid, now: DateTime<Utc>) -> bool {
        self.lease
            .as_ref()
            .map(|lease| lease.token == token && !lease.is_expired(now))
            .unwrap_or(false)
    }
}
