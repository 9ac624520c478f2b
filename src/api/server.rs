//! The orchestrator's network surface: four worker/admin operations over
//! the lease store, plus the fulfillment enqueue and a dashboard read.
//!
//! Handlers are stateless translation only; every rule lives in the store.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::Job;
use crate::store::{EnqueueOutcome, LeaseStore};

use super::types::{
    CompleteRequest, CompleteResponse, EnqueueRequest, EnqueueResponse, ErrorBody, JobDescriptor,
    NextRequest, NextResponse, OkResponse, RejectedResult, RetryRequest, UpdateRequest,
    UpdateResponse,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LeaseStore>,
    pub config: Arc<Config>,
}

/// An API-level failure with its HTTP mapping.
pub struct ApiFailure {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiFailure {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthorized",
            message: "missing or invalid bearer token".to_string(),
        }
    }
}

impl From<StoreError> for ApiFailure {
    fn from(err: StoreError) -> Self {
        let (status, kind) = match &err {
            StoreError::LeaseExpired { .. } => (StatusCode::CONFLICT, "lease_expired"),
            StoreError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
            StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            StoreError::UnknownDirectory { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "unknown_directory"),
            StoreError::Persistence { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "persistence"),
        };
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: self.kind.to_string(),
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/next", post(next))
        .route("/update", post(update))
        .route("/complete", post(complete))
        .route("/retry", post(retry))
        .route("/jobs", post(enqueue))
        .route("/jobs/:id", get(get_job))
        .with_state(state)
}

/// Binds and serves until shutdown flips; in-flight requests drain first.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!("orchestrator API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "time": Utc::now() }))
}

async fn next(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NextRequest>,
) -> Result<Json<NextResponse>, ApiFailure> {
    authorize(&headers, &state.config.worker_token)?;

    let Some(claimed) = state.store.claim_next(&req.worker_id, &req.capabilities).await else {
        return Ok(Json(NextResponse::none()));
    };

    Ok(Json(NextResponse {
        empty: false,
        job: Some(JobDescriptor {
            job_id: claimed.job.id,
            lease_token: claimed.lease_token,
            profile: claimed.job.profile,
            directories: claimed.job.directories,
            already_submitted: claimed.already_submitted,
        }),
    }))
}

async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>, ApiFailure> {
    authorize(&headers, &state.config.worker_token)?;

    let mut response = UpdateResponse::default();
    for result in req.results {
        let directory = result.directory.clone();
        match state
            .store
            .append_result(&req.job_id, req.lease_token, result)
            .await
        {
            Ok(()) => response.accepted.push(directory),
            // These mean the caller's claim on the whole job is gone; the
            // request fails so the worker stops driving directories it can
            // no longer record.
            Err(
                err @ (StoreError::LeaseExpired { .. }
                | StoreError::InvalidState { .. }
                | StoreError::NotFound { .. }),
            ) => return Err(err.into()),
            Err(err) => response.rejected.push(RejectedResult {
                directory,
                error: err.to_string(),
            }),
        }
    }
    Ok(Json(response))
}

async fn complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, ApiFailure> {
    authorize(&headers, &state.config.worker_token)?;

    let summary = state
        .store
        .finalize(&req.job_id, req.lease_token, req.final_status, req.summary)
        .await?;
    Ok(Json(CompleteResponse { ok: true, summary }))
}

async fn retry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RetryRequest>,
) -> Result<Json<OkResponse>, ApiFailure> {
    // Administrative scope, separate credential from the worker fleet.
    authorize(&headers, &state.config.admin_token)?;

    state.store.retry(&req.job_id).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn enqueue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiFailure> {
    authorize(&headers, &state.config.admin_token)?;

    let mut job = Job::new(
        req.job_id,
        req.customer_id,
        req.priority,
        req.profile,
        req.directories,
    );
    job.metadata = req.metadata;
    let outcome = state.store.enqueue(job).await?;
    Ok(Json(EnqueueResponse {
        ok: true,
        created: outcome == EnqueueOutcome::Created,
    }))
}

async fn get_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    authorize(&headers, &state.config.admin_token)?;

    let view = state.store.get(&id).await?;
    Ok(Json(json!({
        "job": view.job,
        "results": view.results,
    })))
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), ApiFailure> {
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiFailure::unauthorized()),
    }
}
