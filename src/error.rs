//! Application error taxonomy.
//!
//! Grouped by the surface the error comes from: the lease store, the
//! orchestrator API, the browser, submission execution, configuration.
//! Orchestration seams work in `anyhow::Result`; these types are the
//! boundaries where callers branch on the failure kind.

use thiserror::Error;

use crate::models::{JobStatus, LogicalField};

/// Failures of lease-guarded store operations.
///
/// `LeaseExpired` means the caller's claim is gone: it must re-claim, never
/// blindly re-send the same write.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {job_id}: lease token is not the current holder or has expired")]
    LeaseExpired { job_id: String },

    #[error("job {job_id}: operation requires status {expected:?}, found {actual:?}")]
    InvalidState {
        job_id: String,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("job {job_id}: not found")]
    NotFound { job_id: String },

    #[error("job {job_id}: directory {directory} is not part of this job")]
    UnknownDirectory { job_id: String, directory: String },

    #[error("persistence failure: {detail}")]
    Persistence { detail: String },
}

impl StoreError {
    pub fn lease_expired(job_id: impl Into<String>) -> Self {
        StoreError::LeaseExpired { job_id: job_id.into() }
    }

    pub fn not_found(job_id: impl Into<String>) -> Self {
        StoreError::NotFound { job_id: job_id.into() }
    }
}

/// Worker-side failures talking to the orchestrator API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned {status}: {message}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("could not decode response from {endpoint}: {source}")]
    DecodeFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Store rejections surface as 404/409; treat those as terminal for the
    /// current lease, everything else as transport trouble worth one re-send.
    pub fn is_lease_rejection(&self) -> bool {
        matches!(
            self,
            ApiError::BadResponse { status, .. } if *status == 404 || *status == 409
        )
    }
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("could not connect to browser on port {port}: {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("could not launch headless browser: {detail}")]
    LaunchFailed { detail: String },

    #[error("navigation to {url} failed: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("script execution failed: {source}")]
    ScriptFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Failures of a single submission attempt.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Bounded-retryable navigation trouble (timeout, connection reset).
    #[error("transient navigation error for {url}: {detail}")]
    TransientNavigation { url: String, detail: String },

    #[error("form never became interactive within {timeout_secs}s")]
    FormNotInteractive { timeout_secs: u64 },

    #[error("required fields could not be bound: {missing:?}")]
    UnmappableForm { missing: Vec<LogicalField> },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {var} has value '{value}', expected {expected}")]
    EnvVarParseFailed {
        var: String,
        value: String,
        expected: &'static str,
    },

    #[error("catalog file {path} could not be loaded: {detail}")]
    CatalogLoadFailed { path: String, detail: String },
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::ScriptFailed { source: Box::new(err) }
    }
}
