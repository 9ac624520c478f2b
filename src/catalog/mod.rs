//! Read-only directory metadata catalog.
//!
//! Maps a directory id to its submission URL, selector hints, success and
//! error indicators and priority weight. The worker only ever reads from it;
//! maintaining the catalog is an external concern.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::models::LogicalField;

/// How a directory signals that a submission landed, or bounced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Indicator {
    /// The page navigated away from the submission URL.
    UrlChange,
    /// Page text matches this pattern (regex, case-insensitive).
    Text { value: String },
    /// An element matching this selector is present.
    Selector { value: String },
}

/// Catalog row for one target directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
    pub url: String,
    /// Higher-authority directories are attempted first.
    #[serde(default)]
    pub priority_weight: i32,
    /// Fast-path selectors, valid while the directory's markup is unchanged.
    #[serde(default)]
    pub selector_hints: HashMap<LogicalField, String>,
    /// Fields whose absence makes the attempt a skip, not a partial fill.
    #[serde(default)]
    pub required_fields: Vec<LogicalField>,
    #[serde(default)]
    pub success_indicators: Vec<Indicator>,
    #[serde(default)]
    pub error_indicators: Vec<Indicator>,
    /// Explicit submit control; when absent the executor uses the form's
    /// discovered submitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_selector: Option<String>,
    /// Known to gate submissions behind a CAPTCHA. Informational; the
    /// executor still attempts and lets the indicators decide.
    #[serde(default)]
    pub captcha_expected: bool,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "directory")]
    directories: Vec<DirectoryEntry>,
}

/// The full catalog, keyed by directory id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, DirectoryEntry>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogLoadFailed {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let catalog = Self::parse(&raw).map_err(|detail| ConfigError::CatalogLoadFailed {
            path: path.display().to_string(),
            detail,
        })?;
        info!("loaded {} directories from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let file: CatalogFile = toml::from_str(raw).map_err(|e| e.to_string())?;
        Ok(Self::from_entries(file.directories))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&DirectoryEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Orders a job's directory list by catalog priority weight, highest
    /// authority first. Ids the catalog does not know keep their relative
    /// order at the end; the worker will record them as failed lookups.
    pub fn order_by_priority(&self, ids: &[String]) -> Vec<String> {
        let mut ordered: Vec<String> = ids.to_vec();
        ordered.sort_by_key(|id| {
            self.entries
                .get(id)
                .map(|e| -(e.priority_weight as i64))
                .unwrap_or(i64::MAX)
        });
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[directory]]
        id = "city-index"
        name = "City Business Index"
        url = "https://city-index.example.com/add-listing"
        priority_weight = 80
        required_fields = ["business_name", "address", "city", "phone"]

        [directory.selector_hints]
        business_name = "input[name='company_name']"
        phone = "input[name='telephone']"

        [[directory.success_indicators]]
        kind = "text"
        value = "thank you"

        [[directory.error_indicators]]
        kind = "selector"
        value = ".alert-danger"

        [[directory]]
        id = "local-pages"
        name = "Local Pages"
        url = "https://local-pages.example.com/submit"
        priority_weight = 40

        [[directory.success_indicators]]
        kind = "url_change"
    "#;

    #[test]
    fn parses_entries_and_hints() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);

        let entry = catalog.get("city-index").unwrap();
        assert_eq!(entry.priority_weight, 80);
        assert_eq!(
            entry.selector_hints.get(&LogicalField::BusinessName).unwrap(),
            "input[name='company_name']"
        );
        assert_eq!(entry.required_fields.len(), 4);
        assert_eq!(
            entry.success_indicators,
            vec![Indicator::Text { value: "thank you".to_string() }]
        );

        let other = catalog.get("local-pages").unwrap();
        assert_eq!(other.success_indicators, vec![Indicator::UrlChange]);
        assert!(other.selector_hints.is_empty());
    }

    #[test]
    fn priority_ordering_puts_high_authority_first_and_unknown_last() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        let ordered = catalog.order_by_priority(&[
            "unknown-dir".to_string(),
            "local-pages".to_string(),
            "city-index".to_string(),
        ]);
        assert_eq!(ordered, vec!["city-index", "local-pages", "unknown-dir"]);
    }
}
