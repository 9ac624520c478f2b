//! The durable job queue with token-guarded leases.
//!
//! All mutation happens behind one async mutex held by the single
//! orchestrator process, so every status transition is effectively a
//! compare-and-swap: a claim observes `pending` and writes `leased` in the
//! same critical section, and two concurrent claimers can never both win.
//! Stale-token writes fail with `LeaseExpired` instead of overwriting.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    DirectoryOutcome, DirectoryResult, Job, JobStatus, JobSummary, Lease, ResponseLog,
    WorkerCapabilities,
};

/// Outcome of an enqueue, so fulfillment retries stay idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Created,
    /// A job with this id already exists; nothing was written.
    Duplicate,
}

/// A successful claim: the job snapshot, the lease token guarding all
/// further writes, and the directories a previous holder already landed.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job: Job,
    pub lease_token: Uuid,
    pub already_submitted: Vec<String>,
}

/// Read view for the dashboard collaborator.
#[derive(Debug, Clone)]
pub struct JobView {
    pub job: Job,
    pub results: Vec<DirectoryResult>,
}

#[derive(Debug)]
struct JobRecord {
    job: Job,
    results: HashMap<String, DirectoryResult>,
}

pub struct LeaseStore {
    lease_duration: Duration,
    max_lease_retries: u32,
    state: Mutex<HashMap<String, JobRecord>>,
}

impl LeaseStore {
    pub fn new(lease_duration: Duration, max_lease_retries: u32) -> Self {
        Self {
            lease_duration,
            max_lease_retries,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Accepts a job from the fulfillment collaborator. Re-sending the same
    /// job id is a no-op.
    pub async fn enqueue(&self, job: Job) -> Result<EnqueueOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if state.contains_key(&job.id) {
            return Ok(EnqueueOutcome::Duplicate);
        }
        info!(job_id = %job.id, directories = job.directory_count(), "job enqueued");
        state.insert(
            job.id.clone(),
            JobRecord {
                job,
                results: HashMap::new(),
            },
        );
        Ok(EnqueueOutcome::Created)
    }

    /// Claims the oldest eligible pending job: priority tier ascending, then
    /// creation time ascending. Exactly one concurrent caller can win a
    /// given job because the pending check and the lease write share the
    /// critical section.
    pub async fn claim_next(
        &self,
        worker_id: &str,
        capabilities: &WorkerCapabilities,
    ) -> Option<ClaimedJob> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let candidate = state
            .values()
            .filter(|r| r.job.status == JobStatus::Pending)
            .filter(|r| match capabilities.max_directories {
                Some(max) => r.job.directory_count() <= max,
                None => true,
            })
            .min_by_key(|r| (r.job.priority, r.job.created_at, r.job.id.clone()))?
            .job
            .id
            .clone();

        let record = state.get_mut(&candidate)?;
        let token = Uuid::new_v4();
        record.job.status = JobStatus::Leased;
        record.job.lease = Some(Lease {
            token,
            worker_id: worker_id.to_string(),
            expires_at: now + self.lease_duration,
        });
        record.job.updated_at = now;

        let already_submitted = record
            .results
            .values()
            .filter(|r| r.outcome == DirectoryOutcome::Submitted)
            .map(|r| r.directory.clone())
            .collect();

        info!(job_id = %record.job.id, worker = worker_id, "job claimed");
        Some(ClaimedJob {
            job: record.job.clone(),
            lease_token: token,
            already_submitted,
        })
    }

    /// Records one directory attempt and refreshes the lease (heartbeat).
    ///
    /// Re-applying an identical observation leaves the row untouched, so a
    /// worker can safely re-send after an ambiguous persistence failure.
    pub async fn append_result(
        &self,
        job_id: &str,
        lease_token: Uuid,
        result: DirectoryResult,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let record = state
            .get_mut(job_id)
            .ok_or_else(|| StoreError::not_found(job_id))?;
        let now = Utc::now();

        if record.job.status.is_terminal() {
            return Err(StoreError::InvalidState {
                job_id: job_id.to_string(),
                expected: JobStatus::Leased,
                actual: record.job.status,
            });
        }
        if !record.job.holds_valid_lease(lease_token, now) {
            return Err(StoreError::lease_expired(job_id));
        }
        if !record.job.directories.contains(&result.directory) {
            return Err(StoreError::UnknownDirectory {
                job_id: job_id.to_string(),
                directory: result.directory,
            });
        }

        match record.results.get_mut(&result.directory) {
            Some(existing) if existing.same_observation(&result) => {}
            Some(existing) => {
                let attempts = existing.attempt_count + 1;
                *existing = result;
                existing.attempt_count = attempts;
            }
            None => {
                record.results.insert(result.directory.clone(), result);
            }
        }

        if let Some(lease) = record.job.lease.as_mut() {
            lease.expires_at = now + self.lease_duration;
        }
        record.job.updated_at = now;
        Ok(())
    }

    /// Closes a job out atomically. Directories the worker never reported
    /// are recorded as failed so the stored summary always sums to the
    /// job's directory count.
    pub async fn finalize(
        &self,
        job_id: &str,
        lease_token: Uuid,
        final_status: JobStatus,
        reported: JobSummary,
    ) -> Result<JobSummary, StoreError> {
        if !final_status.is_terminal() {
            return Err(StoreError::InvalidState {
                job_id: job_id.to_string(),
                expected: JobStatus::Complete,
                actual: final_status,
            });
        }

        let mut state = self.state.lock().await;
        let record = state
            .get_mut(job_id)
            .ok_or_else(|| StoreError::not_found(job_id))?;
        let now = Utc::now();

        if record.job.status.is_terminal() {
            return Err(StoreError::InvalidState {
                job_id: job_id.to_string(),
                expected: JobStatus::Leased,
                actual: record.job.status,
            });
        }
        if !record.job.holds_valid_lease(lease_token, now) {
            return Err(StoreError::lease_expired(job_id));
        }

        let summary = close_out(record, now);
        if summary != reported {
            warn!(
                job_id,
                ?reported,
                ?summary,
                "worker-reported summary disagrees with recorded rows; keeping the rows"
            );
        }

        record.job.status = final_status;
        record.job.summary = Some(summary);
        record.job.lease = None;
        record.job.updated_at = now;
        info!(job_id, status = ?final_status, ?summary, "job finalized");
        Ok(summary)
    }

    /// Returns expired leases to `pending`, or to `failed` once a job has
    /// burned through the retry bound. This sweep is the only crash-recovery
    /// path; nothing else may drop a leased job.
    pub async fn expire_stale_leases(&self) -> Vec<(String, JobStatus)> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut swept = Vec::new();

        for record in state.values_mut() {
            if record.job.status != JobStatus::Leased {
                continue;
            }
            let expired = record
                .job
                .lease
                .as_ref()
                .map(|l| l.is_expired(now))
                .unwrap_or(true);
            if !expired {
                continue;
            }

            record.job.retry_count += 1;
            record.job.lease = None;
            record.job.updated_at = now;
            if record.job.retry_count > self.max_lease_retries {
                let summary = close_out(record, now);
                record.job.status = JobStatus::Failed;
                record.job.summary = Some(summary);
                warn!(job_id = %record.job.id, retries = record.job.retry_count, "lease retry bound exceeded, job failed");
            } else {
                record.job.status = JobStatus::Pending;
                warn!(job_id = %record.job.id, retries = record.job.retry_count, "stale lease released, job re-queued");
            }
            swept.push((record.job.id.clone(), record.job.status));
        }
        swept
    }

    /// Administrative re-drive of a failed job.
    pub async fn retry(&self, job_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let record = state
            .get_mut(job_id)
            .ok_or_else(|| StoreError::not_found(job_id))?;
        if record.job.status != JobStatus::Failed {
            return Err(StoreError::InvalidState {
                job_id: job_id.to_string(),
                expected: JobStatus::Failed,
                actual: record.job.status,
            });
        }
        record.job.status = JobStatus::Pending;
        record.job.retry_count = 0;
        record.job.lease = None;
        record.job.summary = None;
        record.job.updated_at = Utc::now();
        info!(job_id, "failed job reset to pending by operator");
        Ok(())
    }

    /// Snapshot of a job and its recorded rows, for the dashboard.
    pub async fn get(&self, job_id: &str) -> Result<JobView, StoreError> {
        let state = self.state.lock().await;
        let record = state
            .get(job_id)
            .ok_or_else(|| StoreError::not_found(job_id))?;
        let mut results: Vec<DirectoryResult> = record.results.values().cloned().collect();
        results.sort_by(|a, b| a.directory.cmp(&b.directory));
        Ok(JobView {
            job: record.job.clone(),
            results,
        })
    }
}

/// Fills rows for never-attempted directories and tallies the terminal
/// counts. Runs inside the store lock.
fn close_out(record: &mut JobRecord, now: chrono::DateTime<Utc>) -> JobSummary {
    for directory in &record.job.directories {
        let needs_fill = record
            .results
            .get(directory)
            .map(|r| !r.outcome.is_terminal())
            .unwrap_or(true);
        if needs_fill {
            let mut row = DirectoryResult::new(
                directory.clone(),
                DirectoryOutcome::Failed,
                ResponseLog::error("never attempted", true),
            );
            row.last_attempt_at = now;
            record.results.insert(directory.clone(), row);
        }
    }

    let mut summary = JobSummary::default();
    for directory in &record.job.directories {
        match record.results.get(directory).map(|r| r.outcome) {
            Some(DirectoryOutcome::Submitted) => summary.submitted += 1,
            Some(DirectoryOutcome::Skipped) => summary.skipped += 1,
            _ => summary.failed += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BusinessProfile;
    use std::sync::Arc;

    fn job(id: &str, priority: i32, directories: &[&str]) -> Job {
        Job::new(
            id,
            "cust-1",
            priority,
            BusinessProfile::default(),
            directories.iter().map(|d| d.to_string()).collect(),
        )
    }

    fn store() -> LeaseStore {
        LeaseStore::new(Duration::minutes(2), 3)
    }

    fn submitted(directory: &str) -> DirectoryResult {
        DirectoryResult::new(directory, DirectoryOutcome::Submitted, ResponseLog::default())
    }

    #[tokio::test]
    async fn claims_by_priority_then_age() {
        let store = store();
        store.enqueue(job("late-urgent", 0, &["a"])).await.unwrap();
        store.enqueue(job("early-normal", 1, &["a"])).await.unwrap();

        let caps = WorkerCapabilities::default();
        let first = store.claim_next("w1", &caps).await.unwrap();
        assert_eq!(first.job.id, "late-urgent");
        let second = store.claim_next("w1", &caps).await.unwrap();
        assert_eq!(second.job.id, "early-normal");
        assert!(store.claim_next("w1", &caps).await.is_none());
    }

    #[tokio::test]
    async fn capability_filter_passes_over_oversized_jobs() {
        let store = store();
        store.enqueue(job("big", 0, &["a", "b", "c"])).await.unwrap();
        store.enqueue(job("small", 5, &["a"])).await.unwrap();

        let caps = WorkerCapabilities {
            max_directories: Some(2),
        };
        let claimed = store.claim_next("w1", &caps).await.unwrap();
        assert_eq!(claimed.job.id, "small");
    }

    #[tokio::test]
    async fn concurrent_claims_never_share_a_job() {
        let store = Arc::new(store());
        store.enqueue(job("only", 0, &["a"])).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .claim_next(&format!("w{}", i), &WorkerCapabilities::default())
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_on_job_id() {
        let store = store();
        assert_eq!(
            store.enqueue(job("dup", 0, &["a"])).await.unwrap(),
            EnqueueOutcome::Created
        );
        assert_eq!(
            store.enqueue(job("dup", 0, &["a"])).await.unwrap(),
            EnqueueOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn append_requires_the_current_lease_token() {
        let store = store();
        store.enqueue(job("j", 0, &["a"])).await.unwrap();
        let claimed = store
            .claim_next("w1", &WorkerCapabilities::default())
            .await
            .unwrap();

        let err = store
            .append_result("j", Uuid::new_v4(), submitted("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LeaseExpired { .. }));

        store
            .append_result("j", claimed.lease_token, submitted("a"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn append_is_idempotent_and_counts_real_retries() {
        let store = store();
        store.enqueue(job("j", 0, &["a"])).await.unwrap();
        let claimed = store
            .claim_next("w1", &WorkerCapabilities::default())
            .await
            .unwrap();
        let token = claimed.lease_token;

        let failed = DirectoryResult::new(
            "a",
            DirectoryOutcome::Failed,
            ResponseLog::error("navigation timeout", true),
        );
        store.append_result("j", token, failed.clone()).await.unwrap();
        // Same observation re-applied: row unchanged.
        store.append_result("j", token, failed).await.unwrap();
        let view = store.get("j").await.unwrap();
        assert_eq!(view.results[0].attempt_count, 1);

        // A genuinely new attempt bumps the count.
        store.append_result("j", token, submitted("a")).await.unwrap();
        let view = store.get("j").await.unwrap();
        assert_eq!(view.results[0].attempt_count, 2);
        assert_eq!(view.results[0].outcome, DirectoryOutcome::Submitted);
    }

    #[tokio::test]
    async fn append_acts_as_heartbeat() {
        let store = LeaseStore::new(Duration::milliseconds(120), 3);
        store.enqueue(job("j", 0, &["a", "b"])).await.unwrap();
        let claimed = store
            .claim_next("w1", &WorkerCapabilities::default())
            .await
            .unwrap();
        let token = claimed.lease_token;

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        store.append_result("j", token, submitted("a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        // 160ms after claim: only alive because the append refreshed it.
        store.append_result("j", token, submitted("b")).await.unwrap();
    }

    #[tokio::test]
    async fn finalize_fills_unattempted_rows_and_conserves_counts() {
        let store = store();
        store.enqueue(job("j", 0, &["a", "b", "c"])).await.unwrap();
        let claimed = store
            .claim_next("w1", &WorkerCapabilities::default())
            .await
            .unwrap();
        let token = claimed.lease_token;
        store.append_result("j", token, submitted("a")).await.unwrap();

        let stored = store
            .finalize("j", token, JobStatus::Complete, JobSummary {
                submitted: 1,
                failed: 2,
                skipped: 0,
            })
            .await
            .unwrap();
        assert_eq!(stored.total(), 3);
        assert_eq!(stored.submitted, 1);
        assert_eq!(stored.failed, 2);

        let view = store.get("j").await.unwrap();
        assert_eq!(view.job.status, JobStatus::Complete);
        assert_eq!(view.results.len(), 3);
        assert!(view.job.lease.is_none());

        // Terminal: no further writes.
        let err = store
            .append_result("j", token, submitted("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn sweep_requeues_expired_leases_until_the_bound_then_fails() {
        let store = LeaseStore::new(Duration::milliseconds(10), 2);
        store.enqueue(job("j", 0, &["a"])).await.unwrap();

        for round in 1..=2u32 {
            store
                .claim_next("w1", &WorkerCapabilities::default())
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let swept = store.expire_stale_leases().await;
            assert_eq!(swept, vec![("j".to_string(), JobStatus::Pending)]);
            assert_eq!(store.get("j").await.unwrap().job.retry_count, round);
        }

        // Third expiry exceeds max_lease_retries = 2.
        store
            .claim_next("w1", &WorkerCapabilities::default())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let swept = store.expire_stale_leases().await;
        assert_eq!(swept, vec![("j".to_string(), JobStatus::Failed)]);

        let view = store.get("j").await.unwrap();
        assert_eq!(view.job.status, JobStatus::Failed);
        assert_eq!(view.job.summary.unwrap().total(), 1);
    }

    #[tokio::test]
    async fn sweep_leaves_live_leases_alone() {
        let store = store();
        store.enqueue(job("j", 0, &["a"])).await.unwrap();
        store
            .claim_next("w1", &WorkerCapabilities::default())
            .await
            .unwrap();
        assert!(store.expire_stale_leases().await.is_empty());
        assert_eq!(store.get("j").await.unwrap().job.status, JobStatus::Leased);
    }

    #[tokio::test]
    async fn reclaim_reports_previously_submitted_directories() {
        let store = LeaseStore::new(Duration::milliseconds(10), 3);
        store.enqueue(job("j", 0, &["a", "b", "c", "d", "e"])).await.unwrap();
        let first = store
            .claim_next("w1", &WorkerCapabilities::default())
            .await
            .unwrap();
        store
            .append_result("j", first.lease_token, submitted("a"))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        store.expire_stale_leases().await;

        let second = store
            .claim_next("w2", &WorkerCapabilities::default())
            .await
            .unwrap();
        assert_eq!(second.already_submitted, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn retry_only_applies_to_failed_jobs() {
        let store = store();
        store.enqueue(job("j", 0, &["a"])).await.unwrap();
        let claimed = store
            .claim_next("w1", &WorkerCapabilities::default())
            .await
            .unwrap();
        store
            .finalize("j", claimed.lease_token, JobStatus::Complete, JobSummary {
                submitted: 0,
                failed: 1,
                skipped: 0,
            })
            .await
            .unwrap();

        let err = store.retry("j").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));
        assert_eq!(store.get("j").await.unwrap().job.status, JobStatus::Complete);
    }

    #[tokio::test]
    async fn retry_resets_a_failed_job_for_reclaim() {
        let store = store();
        store.enqueue(job("j", 0, &["a"])).await.unwrap();
        let claimed = store
            .claim_next("w1", &WorkerCapabilities::default())
            .await
            .unwrap();
        store
            .finalize("j", claimed.lease_token, JobStatus::Failed, JobSummary {
                submitted: 0,
                failed: 1,
                skipped: 0,
            })
            .await
            .unwrap();

        store.retry("j").await.unwrap();
        let view = store.get("j").await.unwrap();
        assert_eq!(view.job.status, JobStatus::Pending);
        assert_eq!(view.job.retry_count, 0);
        assert!(store
            .claim_next("w2", &WorkerCapabilities::default())
            .await
            .is_some());
    }
}
