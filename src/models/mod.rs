//! Domain model types shared by the store, the API and the worker.

pub mod job;
pub mod profile;
pub mod result;

pub use job::{Job, JobStatus, JobSummary, Lease, WorkerCapabilities};
pub use profile::{BusinessProfile, LogicalField};
pub use result::{DirectoryOutcome, DirectoryResult, ResponseLog};
