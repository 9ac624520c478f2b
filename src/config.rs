/// Runtime configuration, resolved once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // --- orchestrator ---
    /// Address the orchestrator API binds to.
    pub bind_addr: String,
    /// How long a claim stays valid without a heartbeat, in seconds.
    pub lease_duration_secs: u64,
    /// How often the stale-lease sweeper runs, in seconds.
    pub sweep_interval_secs: u64,
    /// Expired leases beyond this many re-queues mark the job failed.
    pub max_lease_retries: u32,
    // --- worker ---
    /// Base URL of the orchestrator API.
    pub orchestrator_url: String,
    /// Identifier this worker claims jobs under.
    pub worker_id: String,
    /// Idle sleep between empty claim attempts, in seconds.
    pub poll_interval_secs: u64,
    /// Hard upper bound for one directory attempt, in seconds.
    pub directory_timeout_secs: u64,
    /// Directory attempts run in parallel per job.
    pub max_concurrent_directories: usize,
    /// Internal retries for transient navigation errors within one attempt.
    pub max_transient_retries: u32,
    /// Most directories this worker will accept in a single job.
    pub max_directories_per_job: Option<usize>,
    // --- browser ---
    pub browser_debug_port: u16,
    /// Launch a headless browser instead of attaching to the debug port.
    pub headless: bool,
    /// Seconds to wait for a submission form to become interactive.
    pub form_wait_secs: u64,
    /// Milliseconds to let the page settle after submitting.
    pub post_submit_wait_ms: u64,
    /// Where failure screenshots are written; empty disables capture.
    pub screenshot_dir: String,
    // --- shared ---
    /// Path to the directory catalog TOML file.
    pub catalog_path: String,
    /// Bearer token workers present on next/update/complete.
    pub worker_token: String,
    /// Bearer token for the administrative surface (retry, enqueue).
    pub admin_token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8320".to_string(),
            lease_duration_secs: 120,
            sweep_interval_secs: 30,
            max_lease_retries: 3,
            orchestrator_url: "http://127.0.0.1:8320".to_string(),
            worker_id: format!("worker-{}", std::process::id()),
            poll_interval_secs: 5,
            directory_timeout_secs: 90,
            max_concurrent_directories: 3,
            max_transient_retries: 2,
            max_directories_per_job: None,
            browser_debug_port: 9222,
            headless: true,
            form_wait_secs: 25,
            post_submit_wait_ms: 3000,
            screenshot_dir: "screenshots".to_string(),
            catalog_path: "directories.toml".to_string(),
            worker_token: "worker-dev-token".to_string(),
            admin_token: "admin-dev-token".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            bind_addr: env_or("BIND_ADDR", default.bind_addr),
            lease_duration_secs: env_parse("LEASE_DURATION_SECS", default.lease_duration_secs),
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", default.sweep_interval_secs),
            max_lease_retries: env_parse("MAX_LEASE_RETRIES", default.max_lease_retries),
            orchestrator_url: env_or("ORCHESTRATOR_URL", default.orchestrator_url),
            worker_id: env_or("WORKER_ID", default.worker_id),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS", default.poll_interval_secs),
            directory_timeout_secs: env_parse("DIRECTORY_TIMEOUT_SECS", default.directory_timeout_secs),
            max_concurrent_directories: env_parse("MAX_CONCURRENT_DIRECTORIES", default.max_concurrent_directories),
            max_transient_retries: env_parse("MAX_TRANSIENT_RETRIES", default.max_transient_retries),
            max_directories_per_job: std::env::var("MAX_DIRECTORIES_PER_JOB").ok().and_then(|v| v.parse().ok()),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT", default.browser_debug_port),
            headless: env_parse("HEADLESS", default.headless),
            form_wait_secs: env_parse("FORM_WAIT_SECS", default.form_wait_secs),
            post_submit_wait_ms: env_parse("POST_SUBMIT_WAIT_MS", default.post_submit_wait_ms),
            screenshot_dir: env_or("SCREENSHOT_DIR", default.screenshot_dir),
            catalog_path: env_or("CATALOG_PATH", default.catalog_path),
            worker_token: env_or("WORKER_TOKEN", default.worker_token),
            admin_token: env_or("ADMIN_TOKEN", default.admin_token),
        }
    }
}

fn env_or(var: &str, default: String) -> String {
    std::env::var(var).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
