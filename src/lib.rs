//! # Directory Submit
//!
//! Automated submission of business profiles to online directories, driven
//! by a lease-based job queue.
//!
//! ## Architecture
//!
//! The system splits into an orchestrator process and worker processes,
//! with a strict layering inside the worker:
//!
//! ### Orchestrator side
//! - `store/` - the job lease store: token-guarded claims, idempotent
//!   result recording, stale-lease recovery
//! - `api/server` - the HTTP surface over the store (`/next`, `/update`,
//!   `/complete`, `/retry`, `/jobs`)
//!
//! ### Worker side
//! - `infrastructure/` - holds the scarce page resource, exposes only the
//!   ability to execute JS (`JsExecutor`)
//! - `resolver/` - maps logical business fields to concrete form controls
//!   through a three-tier strategy
//! - `workflow/` - the complete treatment of one directory
//!   (`SubmissionFlow`: navigate, resolve, fill, submit, classify)
//! - `orchestrator/` - the claim loop and per-job fan-out with bounded
//!   concurrency
//!
//! ### Shared
//! - `models/` - jobs, leases, profiles, per-directory results
//! - `catalog/` - read-only directory metadata
//! - `api/client` - the worker's client for the orchestrator API

pub mod api;
pub mod browser;
pub mod catalog;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod resolver;
pub mod store;
pub mod utils;
pub mod workflow;

pub use api::OrchestratorClient;
pub use browser::{connect_to_browser_and_page, launch_headless_browser};
pub use catalog::{Catalog, DirectoryEntry};
pub use config::Config;
pub use error::{ApiError, StoreError, SubmitError};
pub use infrastructure::JsExecutor;
pub use models::{BusinessProfile, Job, JobStatus, LogicalField};
pub use orchestrator::Worker;
pub use store::LeaseStore;
pub use workflow::{SubmissionFlow, Submitter};
