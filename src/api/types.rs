//! Wire types for the orchestrator API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    BusinessProfile, DirectoryResult, JobStatus, JobSummary, WorkerCapabilities,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextRequest {
    pub worker_id: String,
    #[serde(default)]
    pub capabilities: WorkerCapabilities,
}

/// Everything a worker needs to process a claimed job. The profile rides
/// along inline; workers never fetch customer data themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub lease_token: Uuid,
    pub profile: BusinessProfile,
    /// Target directories in catalog-priority order is the worker's job;
    /// this list is as sold.
    pub directories: Vec<String>,
    /// Directories a previous lease holder already landed; a well-behaved
    /// worker does not re-attempt these.
    #[serde(default)]
    pub already_submitted: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextResponse {
    #[serde(default)]
    pub empty: bool,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobDescriptor>,
}

impl NextResponse {
    pub fn none() -> Self {
        Self {
            empty: true,
            job: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub job_id: String,
    pub lease_token: Uuid,
    pub results: Vec<DirectoryResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedResult {
    pub directory: String,
    pub error: String,
}

/// Entry-scoped rejections (e.g. a directory not in the job) are applied
/// independently; one bad entry never drops the valid ones. Job-wide
/// failures such as an expired lease fail the whole request instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub job_id: String,
    pub lease_token: Uuid,
    pub final_status: JobStatus,
    pub summary: JobSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub ok: bool,
    /// The summary as stored, recomputed from the recorded rows.
    pub summary: JobSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Fulfillment hand-off of a purchased package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub job_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub priority: i32,
    pub profile: BusinessProfile,
    pub directories: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub ok: bool,
    /// False when the job id was already known (idempotent re-send).
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub error: String,
}
