//! Worker claim loop.
//!
//! Polls the orchestrator for work, drives one job at a time, and drains
//! gracefully: on shutdown the current job finishes, no new job is claimed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::api::OrchestratorClient;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::models::WorkerCapabilities;
use crate::orchestrator::job_processor::process_job;
use crate::workflow::Submitter;

pub struct Worker {
    client: OrchestratorClient,
    submitter: Arc<dyn Submitter>,
    catalog: Arc<Catalog>,
    config: Arc<Config>,
}

impl Worker {
    pub fn new(
        client: OrchestratorClient,
        submitter: Arc<dyn Submitter>,
        catalog: Arc<Catalog>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            client,
            submitter,
            catalog,
            config,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let capabilities = WorkerCapabilities {
            max_directories: self.config.max_directories_per_job,
        };
        log_worker_start(&self.config, self.catalog.len());

        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.client.next(&self.config.worker_id, &capabilities).await {
                Ok(Some(descriptor)) => {
                    info!("🔑 claimed job {}", descriptor.job_id);
                    let job_id = descriptor.job_id.clone();
                    // The claimed job runs to completion even during
                    // shutdown; the lease holder is us until we report.
                    if let Err(e) = process_job(
                        &self.client,
                        self.submitter.clone(),
                        &self.catalog,
                        &self.config,
                        descriptor,
                    )
                    .await
                    {
                        warn!("job {} aborted: {:#}", job_id, e);
                    }
                }
                Ok(None) => {
                    if self.idle(&mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    error!("claim failed: {}", e);
                    if self.idle(&mut shutdown).await {
                        break;
                    }
                }
            }
        }
        info!("👋 worker {} stopped", self.config.worker_id);
    }

    /// Sleeps one poll interval; returns true when shutdown arrived.
    async fn idle(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        tokio::select! {
            _ = tokio::time::sleep(interval) => false,
            _ = shutdown.changed() => *shutdown.borrow(),
        }
    }
}

// ==================== log helpers ====================

fn log_worker_start(config: &Config, catalog_size: usize) {
    info!(
        "🚀 worker {} polling {} every {}s ({} directories in catalog)",
        config.worker_id, config.orchestrator_url, config.poll_interval_secs, catalog_size
    );
}
