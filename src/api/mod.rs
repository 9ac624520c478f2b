//! Orchestrator API: the only network-reachable surface over the lease
//! store, plus the client workers use to reach it.

pub mod client;
pub mod server;
pub mod types;

pub use client::OrchestratorClient;
pub use server::{router, serve, AppState};
pub use types::JobDescriptor;
