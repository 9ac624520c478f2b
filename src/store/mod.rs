//! Job Lease Store and its background maintenance.

pub mod lease_store;

pub use lease_store::{ClaimedJob, EnqueueOutcome, JobView, LeaseStore};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

/// Periodic stale-lease sweep. Runs until shutdown is signalled; there is
/// no final sweep on exit, the next process start picks expired leases up.
pub async fn run_sweeper(
    store: Arc<LeaseStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("stale-lease sweeper running every {:?}", interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let swept = store.expire_stale_leases().await;
                if swept.is_empty() {
                    debug!("sweep: no stale leases");
                } else {
                    info!("sweep: recovered {} stale lease(s)", swept.len());
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("sweeper stopping");
                    return;
                }
            }
        }
    }
}
