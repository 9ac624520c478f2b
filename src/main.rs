use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use directory_submit::api::{serve, AppState, OrchestratorClient};
use directory_submit::browser;
use directory_submit::catalog::Catalog;
use directory_submit::config::Config;
use directory_submit::infrastructure::JsExecutor;
use directory_submit::orchestrator::Worker;
use directory_submit::store::{run_sweeper, LeaseStore};
use directory_submit::utils::init_logging;
use directory_submit::workflow::SubmissionFlow;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let config = Config::from_env();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "server".to_string());
    match mode.as_str() {
        "server" => run_server(config).await,
        "worker" => run_worker(config).await,
        other => anyhow::bail!("unknown mode '{}', expected 'server' or 'worker'", other),
    }
}

/// The orchestrator: lease store, HTTP API and stale-lease sweeper.
async fn run_server(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let store = Arc::new(LeaseStore::new(
        chrono::Duration::seconds(config.lease_duration_secs as i64),
        config.max_lease_retries,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_ctrl_c(shutdown_tx);

    let sweeper = tokio::spawn(run_sweeper(
        store.clone(),
        std::time::Duration::from_secs(config.sweep_interval_secs),
        shutdown_rx.clone(),
    ));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    let state = AppState {
        store,
        config: config.clone(),
    };
    serve(listener, state, shutdown_rx).await?;

    sweeper.await?;
    info!("orchestrator stopped");
    Ok(())
}

/// A worker: browser session, submission flow and the claim loop.
async fn run_worker(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let catalog = Arc::new(Catalog::load(&config.catalog_path)?);

    let (_browser, page) = if config.headless {
        browser::launch_headless_browser().await?
    } else {
        browser::connect_to_browser_and_page(config.browser_debug_port).await?
    };
    let flow = Arc::new(SubmissionFlow::new(JsExecutor::new(page), &config));
    let client = OrchestratorClient::new(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_ctrl_c(shutdown_tx);

    Worker::new(client, flow, catalog, config).run(shutdown_rx).await;
    Ok(())
}

fn spawn_ctrl_c(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("ctrl-c handler failed: {}", e);
            return;
        }
        info!("shutdown requested, draining...");
        let _ = shutdown_tx.send(true);
    });
}
