//! JS executor.
//!
//! Holds the single page resource and exposes the capabilities the
//! submission flow needs. Knows nothing about jobs, catalogs or forms.

use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::BrowserError;

pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigates the page and waits for the load to settle.
    pub async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                source: Box::new(e),
            })?;
        Ok(())
    }

    /// Runs a JS expression and returns its JSON result.
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, BrowserError> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result
            .into_value()
            .map_err(|e| BrowserError::ScriptFailed { source: Box::new(e) })?;
        Ok(json_value)
    }

    /// Runs a JS expression and deserializes the result.
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, BrowserError> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)
            .map_err(|e| BrowserError::ScriptFailed { source: Box::new(e) })?;
        Ok(typed_value)
    }

    /// Captures a PNG of the current viewport to `path`.
    pub async fn screenshot(&self, path: impl AsRef<Path>) -> Result<(), BrowserError> {
        self.page
            .save_screenshot(ScreenshotParams::builder().build(), path)
            .await?;
        Ok(())
    }
}
