use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Launches a headless browser and opens a blank page to drive.
pub async fn launch_headless_browser() -> Result<(Browser, Page)> {
    info!("launching headless browser");

    let config = BrowserConfig::builder()
        .new_headless_mode()
        .args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--remote-debugging-port=0",
        ])
        .build()
        .map_err(|e| {
            error!("headless browser configuration failed: {}", e);
            anyhow::anyhow!("headless browser configuration failed: {}", e)
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("headless browser launch failed: {}", e);
        anyhow::anyhow!("headless browser launch failed: {}", e)
    })?;
    debug!("headless browser launched");

    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // Brief pause for browser state to settle after launch.
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("page creation failed: {}", e);
        anyhow::anyhow!("page creation failed: {}", e)
    })?;

    info!("headless browser ready");
    Ok((browser, page))
}
