//! Three-tier field resolution.
//!
//! Tier 1 trusts the catalog's selector hints, tier 2 scores the live form's
//! controls against per-field attribute heuristics, tier 3 walks a generic
//! fallback selector list. First tier to produce exactly one visible,
//! enabled element wins; anything ambiguous is treated as unresolved and
//! handed to the next tier.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::models::LogicalField;

use super::fallback::fallback_selectors;
use super::selector::SelectorPattern;
use super::snapshot::{FieldControl, FormField, FormSnapshot};

/// Which strategy produced a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    Catalog,
    Dynamic,
    Fallback,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Catalog => "catalog",
            ResolutionTier::Dynamic => "dynamic",
            ResolutionTier::Fallback => "fallback",
        }
    }
}

/// A resolved mapping from a logical field to a concrete page selector.
/// Owned by one submission attempt and discarded with it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub field: LogicalField,
    pub selector: String,
    pub tier: ResolutionTier,
    pub control: FieldControl,
}

/// Output of one resolution pass over a snapshot.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub bindings: Vec<FieldBinding>,
    pub unresolved: Vec<LogicalField>,
    /// Selectors that were tried and did not resolve, for the attempt log.
    pub selectors_tried: Vec<String>,
}

impl Resolution {
    pub fn binding_for(&self, field: LogicalField) -> Option<&FieldBinding> {
        self.bindings.iter().find(|b| b.field == field)
    }
}

/// Dynamic-detection scores below this never bind.
const MIN_CONFIDENCE: i32 = 6;

pub struct FormResolver;

impl FormResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves every wanted logical field against the snapshot.
    pub fn resolve(
        &self,
        hints: &HashMap<LogicalField, String>,
        snapshot: &FormSnapshot,
        wanted: &[LogicalField],
    ) -> Resolution {
        let mut resolution = Resolution::default();
        let fillable: Vec<&FormField> = snapshot.fillable_fields().collect();

        for &field in wanted {
            match self.resolve_one(field, hints, &fillable, &mut resolution.selectors_tried) {
                Some(binding) => {
                    debug!(
                        field = %field,
                        tier = binding.tier.as_str(),
                        selector = %binding.selector,
                        "field bound"
                    );
                    resolution.bindings.push(binding);
                }
                None => resolution.unresolved.push(field),
            }
        }
        resolution
    }

    fn resolve_one(
        &self,
        field: LogicalField,
        hints: &HashMap<LogicalField, String>,
        fillable: &[&FormField],
        tried: &mut Vec<String>,
    ) -> Option<FieldBinding> {
        // Tier 1: catalog hint, valid while the directory's markup holds.
        if let Some(hint) = hints.get(&field) {
            match SelectorPattern::parse(hint) {
                Ok(pattern) => {
                    if let Some(target) = exactly_one(fillable, |f| pattern.matches(f)) {
                        return Some(binding(field, target, ResolutionTier::Catalog));
                    }
                    tried.push(format!("{}: {}", field, hint));
                }
                Err(e) => {
                    debug!(field = %field, "unparseable catalog hint: {}", e);
                    tried.push(format!("{}: {}", field, hint));
                }
            }
        }

        // Tier 2: attribute/label heuristics over the live form.
        if let Some(target) = self.detect(field, fillable) {
            return Some(binding(field, target, ResolutionTier::Dynamic));
        }

        // Tier 3: generic conventions, fixed order.
        for raw in fallback_selectors(field) {
            let Ok(pattern) = SelectorPattern::parse(raw) else {
                continue;
            };
            if let Some(target) = exactly_one(fillable, |f| pattern.matches(f)) {
                return Some(binding(field, target, ResolutionTier::Fallback));
            }
            tried.push(format!("{}: {}", field, raw));
        }

        None
    }

    /// Highest-scoring unambiguous candidate at or above the confidence
    /// floor; ties are unresolved rather than guessed at.
    fn detect<'a>(&self, field: LogicalField, fillable: &[&'a FormField]) -> Option<&'a FormField> {
        let mut best: Option<(&FormField, i32)> = None;
        let mut tied = false;

        for candidate in fillable {
            let score = score_candidate(field, candidate);
            if score <= 0 {
                continue;
            }
            match best {
                Some((_, top)) if score > top => {
                    best = Some((candidate, score));
                    tied = false;
                }
                Some((_, top)) if score == top => tied = true,
                None => best = Some((candidate, score)),
                _ => {}
            }
        }

        match best {
            Some((candidate, score)) if !tied && score >= MIN_CONFIDENCE => Some(candidate),
            _ => None,
        }
    }
}

impl Default for FormResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn binding(field: LogicalField, target: &FormField, tier: ResolutionTier) -> FieldBinding {
    FieldBinding {
        field,
        selector: target.concrete_selector(),
        tier,
        control: target.control(),
    }
}

fn exactly_one<'a, P>(fillable: &[&'a FormField], predicate: P) -> Option<&'a FormField>
where
    P: Fn(&FormField) -> bool,
{
    let mut matches = fillable.iter().filter(|f| predicate(f));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first)
}

fn score_candidate(field: LogicalField, candidate: &FormField) -> i32 {
    // None of the logical fields are boolean; never bind a checkbox.
    if candidate.control() == FieldControl::Checkbox {
        return 0;
    }

    let mut score = 0;

    let name = candidate.name.as_deref().map(normalize);
    let id = candidate.id.as_deref().map(normalize);
    let exact = exact_tokens(field);
    let loose = contains_tokens(field);

    let ident_exact = [&name, &id]
        .into_iter()
        .flatten()
        .any(|ident| exact.contains(&ident.as_str()));
    if ident_exact {
        score += 6;
    } else {
        let ident_contains = [&name, &id]
            .into_iter()
            .flatten()
            .any(|ident| loose.iter().any(|t| ident.contains(t)));
        if ident_contains {
            score += 4;
        }
    }

    if let Some(autocomplete) = candidate.autocomplete.as_deref() {
        if autocomplete_tokens(field).contains(&autocomplete.to_ascii_lowercase().as_str()) {
            score += 5;
        }
    }

    if let Some(hint) = type_hint(field) {
        if candidate.input_type.as_deref() == Some(hint) {
            score += 4;
        }
    }

    let text_haystacks = candidate
        .labels
        .iter()
        .map(String::as_str)
        .chain(candidate.placeholder.as_deref())
        .chain(candidate.aria_label.as_deref());
    for haystack in text_haystacks {
        let normalized = normalize(haystack);
        if loose.iter().any(|t| normalized.contains(t)) || exact.contains(&normalized.as_str()) {
            score += 3;
        }
    }

    score += match (field, candidate.control()) {
        (LogicalField::Description, FieldControl::Textarea) => 2,
        (LogicalField::Category, FieldControl::Select) => 2,
        (LogicalField::State, FieldControl::Select) => 1,
        _ => 0,
    };

    score
}

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn exact_tokens(field: LogicalField) -> &'static [&'static str] {
    match field {
        LogicalField::BusinessName => &["businessname", "companyname", "company", "business", "name", "practicename"],
        LogicalField::Email => &["email", "emailaddress"],
        LogicalField::Phone => &["phone", "telephone", "tel", "phonenumber"],
        LogicalField::Website => &["website", "url", "web", "websiteurl"],
        LogicalField::Address => &["address", "street", "address1", "streetaddress"],
        LogicalField::City => &["city", "town"],
        LogicalField::State => &["state", "province", "region"],
        LogicalField::Zip => &["zip", "zipcode", "postalcode", "postcode"],
        LogicalField::Description => &["description", "about", "bio", "summary"],
        LogicalField::Category => &["category", "businesscategory", "industry"],
    }
}

/// Substring tokens; deliberately longer than the exact set so that e.g.
/// "name" never substring-matches "username".
fn contains_tokens(field: LogicalField) -> &'static [&'static str] {
    match field {
        LogicalField::BusinessName => &["businessname", "companyname"],
        LogicalField::Email => &["email"],
        LogicalField::Phone => &["phone", "telephone"],
        LogicalField::Website => &["website"],
        LogicalField::Address => &["address", "street"],
        LogicalField::City => &["city"],
        LogicalField::State => &["state", "province"],
        LogicalField::Zip => &["zipcode", "postal"],
        LogicalField::Description => &["description", "about"],
        LogicalField::Category => &["category", "industry"],
    }
}

fn autocomplete_tokens(field: LogicalField) -> &'static [&'static str] {
    match field {
        LogicalField::BusinessName => &["organization"],
        LogicalField::Email => &["email"],
        LogicalField::Phone => &["tel"],
        LogicalField::Website => &["url"],
        LogicalField::Address => &["street-address", "address-line1"],
        LogicalField::City => &["address-level2"],
        LogicalField::State => &["address-level1"],
        LogicalField::Zip => &["postal-code"],
        LogicalField::Description | LogicalField::Category => &[],
    }
}

fn type_hint(field: LogicalField) -> Option<&'static str> {
    match field {
        LogicalField::Phone => Some("tel"),
        LogicalField::Email => Some("email"),
        LogicalField::Website => Some("url"),
        _ => None,
    }
}
