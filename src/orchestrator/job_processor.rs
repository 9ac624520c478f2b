//! Per-job processing.
//!
//! Fans the claimed job's directories out under a concurrency bound, streams
//! each result back as it lands, then completes the lease. Directories the
//! orchestrator reports as already submitted are never re-attempted; they
//! still count toward the summary so the totals add up.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{JobDescriptor, OrchestratorClient};
use crate::catalog::{Catalog, DirectoryEntry};
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    BusinessProfile, DirectoryOutcome, DirectoryResult, JobStatus, JobSummary, ResponseLog,
};
use crate::workflow::Submitter;

pub async fn process_job(
    client: &OrchestratorClient,
    submitter: Arc<dyn Submitter>,
    catalog: &Catalog,
    config: &Config,
    descriptor: JobDescriptor,
) -> Result<JobSummary> {
    let job_id = descriptor.job_id.clone();
    let lease_token = descriptor.lease_token;
    let already: HashSet<&str> = descriptor
        .already_submitted
        .iter()
        .map(String::as_str)
        .collect();

    let ordered = catalog.order_by_priority(&descriptor.directories);
    log_job_start(&job_id, ordered.len(), already.len());

    // Already-landed directories count as submitted so the summary covers
    // every directory in the job.
    let mut summary = JobSummary {
        submitted: already.len(),
        ..Default::default()
    };
    let mut any_retryable_failure = false;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_directories));
    let timeout = Duration::from_secs(config.directory_timeout_secs);
    let mut tasks = JoinSet::new();

    for directory in ordered {
        if already.contains(directory.as_str()) {
            info!("[{}] {} already submitted, skipping re-attempt", job_id, directory);
            continue;
        }
        let semaphore = semaphore.clone();
        let submitter = submitter.clone();
        let profile = descriptor.profile.clone();
        let entry = catalog.get(&directory).cloned();
        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return DirectoryResult::new(
                        directory,
                        DirectoryOutcome::Failed,
                        ResponseLog::error("worker shutting down", true),
                    )
                }
            };
            attempt_directory(submitter, entry, &profile, directory, timeout).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("[{}] directory task panicked: {}", job_id, e);
                continue;
            }
        };
        match result.outcome {
            DirectoryOutcome::Submitted => summary.submitted += 1,
            DirectoryOutcome::Skipped => summary.skipped += 1,
            DirectoryOutcome::Failed => {
                summary.failed += 1;
                any_retryable_failure |= result.log.retryable;
            }
            DirectoryOutcome::Pending => {}
        }
        if let Err(e) = push_result(client, &job_id, lease_token, result).await {
            // The lease is gone; stop driving directories we can no longer
            // record and let the next claimant resume.
            tasks.abort_all();
            return Err(e).with_context(|| format!("job {}: lease lost mid-flight", job_id));
        }
    }

    // Retryable failures leave the job failed so an operator retry re-drives
    // them; a job that landed anything, or only ever hit dead ends, is done.
    let final_status = if summary.submitted > 0 || !any_retryable_failure {
        JobStatus::Complete
    } else {
        JobStatus::Failed
    };
    let stored = client
        .complete(&job_id, lease_token, final_status, summary)
        .await
        .with_context(|| format!("job {}: completion failed", job_id))?;

    log_job_done(&job_id, final_status, &stored);
    Ok(stored)
}

/// One directory under the per-attempt deadline. Never returns an error;
/// whatever happens is recorded as this directory's result.
async fn attempt_directory(
    submitter: Arc<dyn Submitter>,
    entry: Option<DirectoryEntry>,
    profile: &BusinessProfile,
    directory: String,
    timeout: Duration,
) -> DirectoryResult {
    let entry = match entry {
        Some(entry) => entry,
        None => {
            warn!("{}: no catalog entry", directory);
            return DirectoryResult::new(
                directory,
                DirectoryOutcome::Failed,
                ResponseLog::error("no catalog entry for directory", false),
            );
        }
    };
    match tokio::time::timeout(timeout, submitter.submit(&entry, profile)).await {
        Ok(Ok(report)) => DirectoryResult::new(directory, report.outcome, report.log),
        Ok(Err(e)) => DirectoryResult::new(
            directory,
            DirectoryOutcome::Failed,
            ResponseLog::error(e.to_string(), true),
        ),
        Err(_) => DirectoryResult::new(
            directory,
            DirectoryOutcome::Failed,
            ResponseLog::error(
                format!("attempt timed out after {}s", timeout.as_secs()),
                true,
            ),
        ),
    }
}

/// Streams one result to the orchestrator. Transport trouble gets a single
/// idempotent re-send; a 404/409 means the lease is gone and the error
/// propagates.
async fn push_result(
    client: &OrchestratorClient,
    job_id: &str,
    lease_token: Uuid,
    result: DirectoryResult,
) -> Result<(), ApiError> {
    let first = client.update(job_id, lease_token, vec![result.clone()]).await;
    let response = match first {
        Ok(response) => response,
        Err(e) if e.is_lease_rejection() => return Err(e),
        Err(e) => {
            warn!("[{}] update transport error, re-sending once: {}", job_id, e);
            client.update(job_id, lease_token, vec![result]).await?
        }
    };
    for rejected in &response.rejected {
        warn!(
            "[{}] orchestrator rejected result for {}: {}",
            job_id, rejected.directory, rejected.error
        );
    }
    Ok(())
}

// ==================== log helpers ====================

fn log_job_start(job_id: &str, to_attempt: usize, already: usize) {
    if already > 0 {
        info!(
            "📋 job {}: {} directories to attempt, {} already submitted",
            job_id, to_attempt - already, already
        );
    } else {
        info!("📋 job {}: {} directories to attempt", job_id, to_attempt);
    }
}

fn log_job_done(job_id: &str, status: JobStatus, summary: &JobSummary) {
    info!(
        "🏁 job {} {:?}: {} submitted, {} skipped, {} failed",
        job_id, status, summary.submitted, summary.skipped, summary.failed
    );
}
