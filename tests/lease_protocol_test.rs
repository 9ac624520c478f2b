//! Lease protocol tests over the real HTTP surface.
//!
//! Each test spins the orchestrator on an ephemeral port and drives it the
//! way a worker or the fulfillment collaborator would.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use directory_submit::api::types::EnqueueRequest;
use directory_submit::api::{serve, AppState, OrchestratorClient};
use directory_submit::config::Config;
use directory_submit::models::{
    BusinessProfile, DirectoryOutcome, DirectoryResult, JobStatus, JobSummary, ResponseLog,
    WorkerCapabilities,
};
use directory_submit::store::LeaseStore;

struct TestServer {
    base_url: String,
    store: Arc<LeaseStore>,
    _shutdown: watch::Sender<bool>,
}

async fn spawn_server(config: Config) -> TestServer {
    let config = Arc::new(config);
    let store = Arc::new(LeaseStore::new(
        chrono::Duration::seconds(config.lease_duration_secs as i64),
        config.max_lease_retries,
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState {
        store: store.clone(),
        config,
    };
    tokio::spawn(serve(listener, state, shutdown_rx));
    TestServer {
        base_url,
        store,
        _shutdown: shutdown_tx,
    }
}

fn client_for(server: &TestServer) -> OrchestratorClient {
    OrchestratorClient::with_base_url(
        server.base_url.clone(),
        "worker-dev-token".to_string(),
        "admin-dev-token".to_string(),
    )
}

fn profile() -> BusinessProfile {
    BusinessProfile {
        business_name: "Acme Plumbing".to_string(),
        address: "12 Pipe Lane".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip: "62701".to_string(),
        phone: "555-0147".to_string(),
        email: Some("info@acmeplumbing.example.com".to_string()),
        website: Some("https://acmeplumbing.example.com".to_string()),
        description: Some("Residential plumbing since 1990".to_string()),
        category: Some("Plumber".to_string()),
    }
}

fn enqueue_request(job_id: &str, priority: i32, directories: &[&str]) -> EnqueueRequest {
    EnqueueRequest {
        job_id: job_id.to_string(),
        customer_id: "cust-42".to_string(),
        priority,
        profile: profile(),
        directories: directories.iter().map(|d| d.to_string()).collect(),
        metadata: serde_json::json!({}),
    }
}

fn submitted(directory: &str) -> DirectoryResult {
    DirectoryResult::new(directory, DirectoryOutcome::Submitted, ResponseLog::default())
}

#[tokio::test]
async fn health_is_open_but_operations_require_the_right_token() {
    let server = spawn_server(Config::default()).await;
    let http = reqwest::Client::new();

    let health = http
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);

    // No token at all.
    let bare = http
        .post(format!("{}/next", server.base_url))
        .json(&serde_json::json!({ "worker_id": "w1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bare.status(), 401);

    // Worker token on an admin endpoint.
    let cross = http
        .post(format!("{}/retry", server.base_url))
        .bearer_auth("worker-dev-token")
        .json(&serde_json::json!({ "job_id": "job-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(cross.status(), 401);
}

#[tokio::test]
async fn claim_update_complete_round_trip() {
    let server = spawn_server(Config::default()).await;
    let client = client_for(&server);

    let enq = client
        .enqueue(&enqueue_request("job-1", 0, &["city-business-index", "local-pages"]))
        .await
        .unwrap();
    assert!(enq.created);

    let descriptor = client
        .next("w1", &WorkerCapabilities::default())
        .await
        .unwrap()
        .expect("a pending job should be claimable");
    assert_eq!(descriptor.job_id, "job-1");
    assert!(descriptor.already_submitted.is_empty());
    assert_eq!(descriptor.profile.business_name, "Acme Plumbing");

    let update = client
        .update(
            "job-1",
            descriptor.lease_token,
            vec![submitted("city-business-index")],
        )
        .await
        .unwrap();
    assert_eq!(update.accepted, vec!["city-business-index"]);
    assert!(update.rejected.is_empty());

    // One directory never reported; the store records it failed so the
    // summary still covers both directories.
    let stored = client
        .complete(
            "job-1",
            descriptor.lease_token,
            JobStatus::Complete,
            JobSummary { submitted: 1, failed: 1, skipped: 0 },
        )
        .await
        .unwrap();
    assert_eq!(stored.submitted, 1);
    assert_eq!(stored.failed, 1);
    assert_eq!(stored.total(), 2);

    // Terminal jobs are not claimable.
    let nothing = client.next("w1", &WorkerCapabilities::default()).await.unwrap();
    assert!(nothing.is_none());
}

#[tokio::test]
async fn enqueue_is_idempotent() {
    let server = spawn_server(Config::default()).await;
    let client = client_for(&server);

    let first = client
        .enqueue(&enqueue_request("job-1", 0, &["local-pages"]))
        .await
        .unwrap();
    let second = client
        .enqueue(&enqueue_request("job-1", 0, &["local-pages"]))
        .await
        .unwrap();
    assert!(first.created);
    assert!(!second.created);

    // Still exactly one job behind the duplicate hand-off.
    assert!(client.next("w1", &WorkerCapabilities::default()).await.unwrap().is_some());
    assert!(client.next("w2", &WorkerCapabilities::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn batch_update_applies_entries_independently() {
    let server = spawn_server(Config::default()).await;
    let client = client_for(&server);

    client
        .enqueue(&enqueue_request("job-1", 0, &["city-business-index"]))
        .await
        .unwrap();
    let descriptor = client
        .next("w1", &WorkerCapabilities::default())
        .await
        .unwrap()
        .unwrap();

    let update = client
        .update(
            "job-1",
            descriptor.lease_token,
            vec![submitted("city-business-index"), submitted("not-in-this-job")],
        )
        .await
        .unwrap();
    assert_eq!(update.accepted, vec!["city-business-index"]);
    assert_eq!(update.rejected.len(), 1);
    assert_eq!(update.rejected[0].directory, "not-in-this-job");
}

#[tokio::test]
async fn lower_priority_value_claims_first() {
    let server = spawn_server(Config::default()).await;
    let client = client_for(&server);

    client
        .enqueue(&enqueue_request("job-bulk", 5, &["local-pages"]))
        .await
        .unwrap();
    client
        .enqueue(&enqueue_request("job-rush", 1, &["local-pages"]))
        .await
        .unwrap();

    let first = client.next("w1", &WorkerCapabilities::default()).await.unwrap().unwrap();
    assert_eq!(first.job_id, "job-rush");
    let second = client.next("w2", &WorkerCapabilities::default()).await.unwrap().unwrap();
    assert_eq!(second.job_id, "job-bulk");
}

#[tokio::test]
async fn completing_twice_conflicts() {
    let server = spawn_server(Config::default()).await;
    let client = client_for(&server);

    client
        .enqueue(&enqueue_request("job-1", 0, &["local-pages"]))
        .await
        .unwrap();
    let descriptor = client
        .next("w1", &WorkerCapabilities::default())
        .await
        .unwrap()
        .unwrap();
    client
        .update("job-1", descriptor.lease_token, vec![submitted("local-pages")])
        .await
        .unwrap();
    client
        .complete(
            "job-1",
            descriptor.lease_token,
            JobStatus::Complete,
            JobSummary { submitted: 1, failed: 0, skipped: 0 },
        )
        .await
        .unwrap();

    let again = client
        .complete(
            "job-1",
            descriptor.lease_token,
            JobStatus::Complete,
            JobSummary { submitted: 1, failed: 0, skipped: 0 },
        )
        .await;
    let err = again.expect_err("a second completion must be rejected");
    assert!(err.is_lease_rejection(), "got: {}", err);
}

#[tokio::test]
async fn retry_re_queues_only_failed_jobs() {
    let server = spawn_server(Config::default()).await;
    let client = client_for(&server);

    client
        .enqueue(&enqueue_request("job-1", 0, &["city-business-index", "local-pages"]))
        .await
        .unwrap();

    // Retry before any terminal state is a conflict.
    assert!(client.retry("job-1").await.is_err());

    let descriptor = client
        .next("w1", &WorkerCapabilities::default())
        .await
        .unwrap()
        .unwrap();
    client
        .update(
            "job-1",
            descriptor.lease_token,
            vec![
                submitted("city-business-index"),
                DirectoryResult::new(
                    "local-pages",
                    DirectoryOutcome::Failed,
                    ResponseLog::error("no success confirmation found", true),
                ),
            ],
        )
        .await
        .unwrap();
    client
        .complete(
            "job-1",
            descriptor.lease_token,
            JobStatus::Failed,
            JobSummary { submitted: 1, failed: 1, skipped: 0 },
        )
        .await
        .unwrap();

    client.retry("job-1").await.unwrap();

    // The re-queued job is claimable again and carries what already landed.
    let resumed = client
        .next("w2", &WorkerCapabilities::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resumed.job_id, "job-1");
    assert_eq!(resumed.already_submitted, vec!["city-business-index"]);
}

#[tokio::test]
async fn capability_bound_skips_oversized_jobs() {
    let server = spawn_server(Config::default()).await;
    let client = client_for(&server);

    client
        .enqueue(&enqueue_request(
            "job-big",
            0,
            &["city-business-index", "local-pages", "trade-finder"],
        ))
        .await
        .unwrap();

    let small = WorkerCapabilities { max_directories: Some(2) };
    assert!(client.next("w1", &small).await.unwrap().is_none());
    assert!(client
        .next("w1", &WorkerCapabilities::default())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn expired_lease_rejects_the_old_token_and_resumes_submitted_work() {
    let config = Config {
        lease_duration_secs: 1,
        ..Config::default()
    };
    let server = spawn_server(config).await;
    let client = client_for(&server);

    client
        .enqueue(&enqueue_request("job-1", 0, &["city-business-index", "local-pages"]))
        .await
        .unwrap();

    // Worker A claims, lands one directory, then disappears.
    let first = client
        .next("worker-a", &WorkerCapabilities::default())
        .await
        .unwrap()
        .unwrap();
    client
        .update("job-1", first.lease_token, vec![submitted("city-business-index")])
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    let swept = server.store.expire_stale_leases().await;
    assert_eq!(swept, vec![("job-1".to_string(), JobStatus::Pending)]);

    // Worker B resumes and is told what not to re-attempt.
    let second = client
        .next("worker-b", &WorkerCapabilities::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.already_submitted, vec!["city-business-index"]);
    assert_ne!(second.lease_token, first.lease_token);

    // The crashed worker's token is dead; its writes are refused outright.
    let stale = client
        .update("job-1", first.lease_token, vec![submitted("local-pages")])
        .await;
    let err = stale.expect_err("a stale token must not record results");
    assert!(err.is_lease_rejection(), "got: {}", err);
}
