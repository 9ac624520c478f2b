use anyhow::Result;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Attaches to a browser already listening on a debug port and hands back
/// a page to drive.
pub async fn connect_to_browser_and_page(port: u16) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("connecting to browser at {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("browser connection failed: {}", e);
        e
    })?;
    debug!("browser connection established");

    // Drive browser events in the background for the life of the session.
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // Brief pause for browser state to settle after attach.
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("browser reports {} open page(s)", pages.len());

    let page = match pages.into_iter().next() {
        Some(page) => page,
        None => {
            debug!("no open pages, creating a blank one");
            browser.new_page("about:blank").await.map_err(|e| {
                error!("page creation failed: {}", e);
                e
            })?
        }
    };

    Ok((browser, page))
}
