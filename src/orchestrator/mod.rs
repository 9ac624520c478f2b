//! Worker orchestration: the claim loop and per-job processing.

pub mod job_processor;
pub mod worker;

pub use job_processor::process_job;
pub use worker::Worker;
