//! Logging setup and formatting helpers.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins; the default keeps the
/// browser and HTTP internals quiet.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chromiumoxide=warn,hyper=warn,tungstenite=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Truncates long text for log lines.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("exactly ten", 11), "exactly ten");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate_text("a longer piece of text", 8), "a longer...");
    }
}
