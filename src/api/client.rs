//! Worker-side client for the orchestrator API.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{DirectoryResult, JobStatus, JobSummary, WorkerCapabilities};

use super::types::{
    CompleteRequest, CompleteResponse, EnqueueRequest, EnqueueResponse, ErrorBody, JobDescriptor,
    NextRequest, NextResponse, OkResponse, RetryRequest, UpdateRequest, UpdateResponse,
};

pub struct OrchestratorClient {
    http: reqwest::Client,
    base_url: String,
    worker_token: String,
    admin_token: String,
}

impl OrchestratorClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(
            config.orchestrator_url.clone(),
            config.worker_token.clone(),
            config.admin_token.clone(),
        )
    }

    pub fn with_base_url(base_url: String, worker_token: String, admin_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            worker_token,
            admin_token,
        }
    }

    /// Claims the next eligible job, or `None` when the queue has nothing
    /// for this worker.
    pub async fn next(
        &self,
        worker_id: &str,
        capabilities: &WorkerCapabilities,
    ) -> Result<Option<JobDescriptor>, ApiError> {
        let response: NextResponse = self
            .post(
                "/next",
                &self.worker_token,
                &NextRequest {
                    worker_id: worker_id.to_string(),
                    capabilities: capabilities.clone(),
                },
            )
            .await?;
        Ok(response.job)
    }

    /// Streams a batch of directory results. Entry-scoped rejections come
    /// back in the response; an expired or superseded lease fails the call
    /// with a 409.
    pub async fn update(
        &self,
        job_id: &str,
        lease_token: Uuid,
        results: Vec<DirectoryResult>,
    ) -> Result<UpdateResponse, ApiError> {
        self.post(
            "/update",
            &self.worker_token,
            &UpdateRequest {
                job_id: job_id.to_string(),
                lease_token,
                results,
            },
        )
        .await
    }

    pub async fn complete(
        &self,
        job_id: &str,
        lease_token: Uuid,
        final_status: JobStatus,
        summary: JobSummary,
    ) -> Result<JobSummary, ApiError> {
        let response: CompleteResponse = self
            .post(
                "/complete",
                &self.worker_token,
                &CompleteRequest {
                    job_id: job_id.to_string(),
                    lease_token,
                    final_status,
                    summary,
                },
            )
            .await?;
        Ok(response.summary)
    }

    /// Administrative re-drive of a failed job.
    pub async fn retry(&self, job_id: &str) -> Result<(), ApiError> {
        let _: OkResponse = self
            .post(
                "/retry",
                &self.admin_token,
                &RetryRequest {
                    job_id: job_id.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    /// Administrative enqueue, the fulfillment collaborator's entry point.
    pub async fn enqueue(&self, request: &EnqueueRequest) -> Result<EnqueueResponse, ApiError> {
        self.post("/jobs", &self.admin_token, request).await
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let endpoint = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::RequestFailed {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|source| ApiError::DecodeFailed {
                endpoint,
                source,
            });
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => format!("{}: {}", body.kind, body.error),
            Err(_) => StatusCode::from_u16(status.as_u16())
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("request failed")
                .to_string(),
        };
        Err(ApiError::BadResponse {
            endpoint,
            status: status.as_u16(),
            message,
        })
    }
}
