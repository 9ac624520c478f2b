//! Submission workflow: drives one directory form end to end.

pub mod submission_flow;

pub use submission_flow::{AttemptReport, SubmissionFlow, Submitter};
