//! Directory submission flow.
//!
//! The complete treatment of one directory: navigate, wait for the form,
//! snapshot it, resolve fields, fill, submit, classify the result. Owns the
//! page through its executor; knows nothing about jobs or leases.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use regex::RegexBuilder;
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::catalog::{DirectoryEntry, Indicator};
use crate::config::Config;
use crate::error::{BrowserError, SubmitError};
use crate::infrastructure::JsExecutor;
use crate::models::{BusinessProfile, DirectoryOutcome, LogicalField, ResponseLog};
use crate::resolver::{
    FieldBinding, FieldControl, FormResolver, FormSnapshot, Resolution, FORM_EXTRACTION_SCRIPT,
};

/// What one fully-driven attempt produced. The caller records it; a report
/// is never an error, errors are reserved for trouble reaching the page at
/// all.
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub outcome: DirectoryOutcome,
    pub log: ResponseLog,
}

/// One directory submission, start to finish. The worker depends on this
/// seam, not on a concrete browser.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, entry: &DirectoryEntry, profile: &BusinessProfile)
        -> Result<AttemptReport>;
}

/// Internal attempt failure, before it becomes a report.
enum AttemptError {
    /// Navigation trouble worth an in-place retry.
    Transient(String),
    /// Everything else; the attempt is recorded failed and retry is left to
    /// the orchestrator.
    Broken(String),
}

impl From<BrowserError> for AttemptError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::NavigationFailed { url, source } => {
                AttemptError::Transient(
                    SubmitError::TransientNavigation { url, detail: source.to_string() }
                        .to_string(),
                )
            }
            other => AttemptError::Broken(other.to_string()),
        }
    }
}

pub struct SubmissionFlow {
    /// One page, one attempt at a time. Concurrent callers queue here.
    executor: tokio::sync::Mutex<JsExecutor>,
    resolver: FormResolver,
    form_wait_secs: u64,
    post_submit_wait_ms: u64,
    max_transient_retries: u32,
    screenshot_dir: String,
}

impl SubmissionFlow {
    pub fn new(executor: JsExecutor, config: &Config) -> Self {
        Self {
            executor: tokio::sync::Mutex::new(executor),
            resolver: FormResolver::new(),
            form_wait_secs: config.form_wait_secs,
            post_submit_wait_ms: config.post_submit_wait_ms,
            max_transient_retries: config.max_transient_retries,
            screenshot_dir: config.screenshot_dir.clone(),
        }
    }

    async fn attempt_once(
        &self,
        executor: &JsExecutor,
        entry: &DirectoryEntry,
        profile: &BusinessProfile,
    ) -> Result<AttemptReport, AttemptError> {
        let url = cache_busted(&entry.url);
        debug!("[{}] navigating to {}", entry.id, url);
        executor.goto(&url).await?;
        self.wait_for_form(executor, entry).await?;

        let snapshot: FormSnapshot = executor.eval_as(FORM_EXTRACTION_SCRIPT).await?;
        debug!(
            "[{}] snapshot: {} field(s), {} submitter(s)",
            entry.id,
            snapshot.fields.len(),
            snapshot.submitters.len()
        );

        // Only fields the profile can actually supply are worth binding.
        let wanted: Vec<LogicalField> = LogicalField::ALL
            .iter()
            .copied()
            .filter(|f| profile.value_for(*f).is_some())
            .collect();
        let resolution = self.resolver.resolve(&entry.selector_hints, &snapshot, &wanted);

        let missing: Vec<LogicalField> = entry
            .required_fields
            .iter()
            .copied()
            .filter(|f| resolution.binding_for(*f).is_none())
            .collect();
        if !missing.is_empty() {
            let reason = SubmitError::UnmappableForm { missing }.to_string();
            info!("[{}] ⏭️ skipped: {}", entry.id, reason);
            return Ok(AttemptReport {
                outcome: DirectoryOutcome::Skipped,
                log: ResponseLog {
                    bindings: binding_lines(&resolution),
                    selectors_tried: resolution.selectors_tried,
                    error: Some(reason),
                    retryable: false,
                    screenshot: None,
                },
            });
        }

        for binding in &resolution.bindings {
            if let Some(value) = profile.value_for(binding.field) {
                let filled = self.fill_field(executor, binding, value).await?;
                if !filled {
                    warn!(
                        "[{}] bound selector {} vanished before fill",
                        entry.id, binding.selector
                    );
                }
            }
        }

        self.trigger_submit(executor, entry, &snapshot).await?;
        sleep(Duration::from_millis(self.post_submit_wait_ms)).await;

        let probe = self.gather_probe(executor, entry, &snapshot.url).await?;
        let (outcome, detail) = classify_outcome(entry, &probe);

        let mut log = ResponseLog {
            bindings: binding_lines(&resolution),
            selectors_tried: resolution.selectors_tried,
            error: detail,
            retryable: outcome == DirectoryOutcome::Failed,
            screenshot: None,
        };
        if outcome == DirectoryOutcome::Failed {
            log.screenshot = self.capture_failure(executor, entry).await;
        }
        Ok(AttemptReport { outcome, log })
    }

    /// Polls until the page has a form to work with.
    async fn wait_for_form(
        &self,
        executor: &JsExecutor,
        entry: &DirectoryEntry,
    ) -> Result<(), AttemptError> {
        let deadline = Instant::now() + Duration::from_secs(self.form_wait_secs);
        loop {
            // Eval failures mid-navigation read as "not ready yet".
            let ready = executor
                .eval_as::<bool>("document.readyState === 'complete' && document.forms.length > 0")
                .await
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!("[{}] form never became interactive", entry.id);
                return Err(AttemptError::Transient(
                    SubmitError::FormNotInteractive { timeout_secs: self.form_wait_secs }
                        .to_string(),
                ));
            }
            sleep(Duration::from_millis(500)).await;
        }
    }

    /// Writes one value into its bound control, firing the events frameworks
    /// listen for. Returns false when the element is gone.
    async fn fill_field(
        &self,
        executor: &JsExecutor,
        binding: &FieldBinding,
        value: &str,
    ) -> Result<bool, AttemptError> {
        let sel = js_string(&binding.selector);
        let val = js_string(value);
        let js = match binding.control {
            FieldControl::Text | FieldControl::Textarea => format!(
                r#"(() => {{
                    const el = document.querySelector({sel});
                    if (!el) return false;
                    el.focus();
                    el.value = {val};
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return true;
                }})()"#
            ),
            FieldControl::Select => format!(
                r#"(() => {{
                    const el = document.querySelector({sel});
                    if (!el) return false;
                    const want = {val}.toLowerCase().trim();
                    for (const opt of el.options) {{
                        if (opt.value.toLowerCase() === want || opt.text.toLowerCase().trim() === want) {{
                            el.value = opt.value;
                            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                            return true;
                        }}
                    }}
                    for (const opt of el.options) {{
                        if (opt.text.toLowerCase().includes(want)) {{
                            el.value = opt.value;
                            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                            return true;
                        }}
                    }}
                    return false;
                }})()"#
            ),
            FieldControl::Checkbox => format!(
                r#"(() => {{
                    const el = document.querySelector({sel});
                    if (!el) return false;
                    el.checked = ['true', 'yes', '1', 'on'].includes({val}.toLowerCase());
                    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return true;
                }})()"#
            ),
        };
        Ok(executor.eval_as(js).await?)
    }

    /// Catalog submit selector first, then a discovered submitter, then the
    /// form's own submit machinery.
    async fn trigger_submit(
        &self,
        executor: &JsExecutor,
        entry: &DirectoryEntry,
        snapshot: &FormSnapshot,
    ) -> Result<(), AttemptError> {
        if let Some(sel) = &entry.submit_selector {
            if self.click(executor, sel).await? {
                return Ok(());
            }
            warn!("[{}] submit selector {} matched nothing", entry.id, sel);
        }
        if let Some(candidate) = snapshot.submitters.first() {
            if self.click(executor, &candidate.selector).await? {
                return Ok(());
            }
        }
        let submitted: bool = executor
            .eval_as(
                r#"(() => {
                    const form = document.querySelector('form');
                    if (!form) return false;
                    if (form.requestSubmit) form.requestSubmit(); else form.submit();
                    return true;
                })()"#,
            )
            .await?;
        if submitted {
            Ok(())
        } else {
            Err(AttemptError::Broken("no submit control could be activated".to_string()))
        }
    }

    async fn click(&self, executor: &JsExecutor, selector: &str) -> Result<bool, AttemptError> {
        let sel = js_string(selector);
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.click();
                return true;
            }})()"#
        );
        Ok(executor.eval_as(js).await?)
    }

    /// Reads everything classification needs in one pass over the settled
    /// page, including which selector indicators are present.
    async fn gather_probe(
        &self,
        executor: &JsExecutor,
        entry: &DirectoryEntry,
        before_url: &str,
    ) -> Result<SubmitProbe, AttemptError> {
        #[derive(Deserialize)]
        struct PageState {
            url: String,
            text: String,
        }
        let state: PageState = executor
            .eval_as(
                r#"(() => ({
                    url: location.href,
                    text: document.body ? document.body.innerText : ''
                }))()"#,
            )
            .await?;

        let mut present_selectors = HashSet::new();
        let selector_indicators = entry
            .success_indicators
            .iter()
            .chain(entry.error_indicators.iter())
            .filter_map(|ind| match ind {
                Indicator::Selector { value } => Some(value.as_str()),
                _ => None,
            });
        for selector in selector_indicators {
            let sel = js_string(selector);
            let present: bool = executor
                .eval_as(format!("!!document.querySelector({sel})"))
                .await
                .unwrap_or(false);
            if present {
                present_selectors.insert(selector.to_string());
            }
        }

        Ok(SubmitProbe {
            before_url: before_url.to_string(),
            after_url: state.url,
            page_text: state.text,
            present_selectors,
        })
    }

    /// Best-effort failure screenshot; never fails the attempt.
    async fn capture_failure(
        &self,
        executor: &JsExecutor,
        entry: &DirectoryEntry,
    ) -> Option<String> {
        if self.screenshot_dir.is_empty() {
            return None;
        }
        if let Err(e) = std::fs::create_dir_all(&self.screenshot_dir) {
            warn!("screenshot dir {} unavailable: {}", self.screenshot_dir, e);
            return None;
        }
        let path = format!(
            "{}/{}-{}.png",
            self.screenshot_dir,
            entry.id,
            Utc::now().timestamp_millis()
        );
        match executor.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("[{}] screenshot failed: {}", entry.id, e);
                None
            }
        }
    }
}

#[async_trait]
impl Submitter for SubmissionFlow {
    async fn submit(
        &self,
        entry: &DirectoryEntry,
        profile: &BusinessProfile,
    ) -> Result<AttemptReport> {
        let executor = self.executor.lock().await;
        let mut attempt = 0u32;
        loop {
            match self.attempt_once(&executor, entry, profile).await {
                Ok(report) => {
                    log_outcome(entry, &report);
                    return Ok(report);
                }
                Err(AttemptError::Transient(detail)) if attempt < self.max_transient_retries => {
                    attempt += 1;
                    warn!(
                        "[{}] transient error, retry {}/{}: {}",
                        entry.id, attempt, self.max_transient_retries, detail
                    );
                    sleep(Duration::from_millis(500)).await;
                }
                Err(AttemptError::Transient(detail)) => {
                    warn!("[{}] ❌ transient retries exhausted: {}", entry.id, detail);
                    return Ok(AttemptReport {
                        outcome: DirectoryOutcome::Failed,
                        log: ResponseLog::error(detail, true),
                    });
                }
                Err(AttemptError::Broken(detail)) => {
                    warn!("[{}] ❌ attempt broke: {}", entry.id, detail);
                    return Ok(AttemptReport {
                        outcome: DirectoryOutcome::Failed,
                        log: ResponseLog::error(detail, true),
                    });
                }
            }
        }
    }
}

/// Everything classification looks at, captured after the settle wait.
#[derive(Debug, Clone)]
pub struct SubmitProbe {
    pub before_url: String,
    pub after_url: String,
    pub page_text: String,
    pub present_selectors: HashSet<String>,
}

/// Error indicators outrank success indicators: a page can thank you and
/// still show a validation error.
pub fn classify_outcome(
    entry: &DirectoryEntry,
    probe: &SubmitProbe,
) -> (DirectoryOutcome, Option<String>) {
    if let Some(hit) = entry.error_indicators.iter().find(|i| indicator_hit(i, probe)) {
        return (
            DirectoryOutcome::Failed,
            Some(format!("error indicator matched: {}", describe_indicator(hit))),
        );
    }
    if entry.success_indicators.iter().any(|i| indicator_hit(i, probe)) {
        return (DirectoryOutcome::Submitted, None);
    }
    (
        DirectoryOutcome::Failed,
        Some("no success confirmation found".to_string()),
    )
}

fn indicator_hit(indicator: &Indicator, probe: &SubmitProbe) -> bool {
    match indicator {
        Indicator::UrlChange => probe.after_url != probe.before_url,
        Indicator::Text { value } => text_matches(value, &probe.page_text),
        Indicator::Selector { value } => probe.present_selectors.contains(value),
    }
}

/// Indicator patterns are regexes; a pattern that does not compile is
/// treated as a literal substring.
fn text_matches(pattern: &str, text: &str) -> bool {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(text),
        Err(_) => text.to_lowercase().contains(&pattern.to_lowercase()),
    }
}

fn describe_indicator(indicator: &Indicator) -> String {
    match indicator {
        Indicator::UrlChange => "url_change".to_string(),
        Indicator::Text { value } => format!("text '{}'", value),
        Indicator::Selector { value } => format!("selector '{}'", value),
    }
}

/// Directories cache aggressively; a unique query param defeats stale form
/// markup.
pub fn cache_busted(url: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}_cb={}", url, sep, Utc::now().timestamp_millis())
}

fn binding_lines(resolution: &Resolution) -> Vec<String> {
    resolution
        .bindings
        .iter()
        .map(|b| format!("{}: {}", b.field, b.tier.as_str()))
        .collect()
}

/// Serializes a Rust string as a JS string literal for inline snippets.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

// ==================== log helpers ====================

fn log_outcome(entry: &DirectoryEntry, report: &AttemptReport) {
    match report.outcome {
        DirectoryOutcome::Submitted => info!("[{}] ✅ submitted", entry.id),
        DirectoryOutcome::Skipped => info!("[{}] ⏭️ skipped", entry.id),
        DirectoryOutcome::Failed => warn!(
            "[{}] ❌ failed: {}",
            entry.id,
            crate::utils::truncate_text(report.log.error.as_deref().unwrap_or("unknown"), 160)
        ),
        DirectoryOutcome::Pending => {}
    }
}
