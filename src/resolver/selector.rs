//! The selector dialect catalog hints and fallback patterns are written in.
//!
//! This is deliberately not a CSS engine. It covers the subset the catalog
//! actually uses — `tag`, `#id`, `.class`, `[attr='value']` and their
//! combinations, with an optional chain of `.class` ancestor qualifiers
//! (`.business-name input`) — and matches against captured form snapshots
//! instead of a live DOM, so resolution is testable without a browser.

use std::fmt;

use super::snapshot::FormField;

/// One compound selector: `input.wide[name='phone']`, `#email`, `textarea`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// Attribute equality tests; supported attributes are `name`, `type`,
    /// `id` and `placeholder`.
    pub attrs: Vec<(String, String)>,
}

/// A parsed pattern: ancestor class qualifiers plus the target selector.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorPattern {
    pub ancestor_classes: Vec<String>,
    pub target: SimpleSelector,
    raw: String,
}

impl fmt::Display for SelectorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl SelectorPattern {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("empty selector".to_string());
        }

        let parts: Vec<&str> = raw.split_whitespace().collect();
        let (ancestor_parts, target_part) = parts.split_at(parts.len() - 1);

        let mut ancestor_classes = Vec::new();
        for part in ancestor_parts {
            // Ancestor qualifiers are matched against ancestor class lists,
            // so only the `.class` form is meaningful here.
            let class = part
                .strip_prefix('.')
                .filter(|c| !c.is_empty() && !c.contains(['.', '#', '[']))
                .ok_or_else(|| format!("unsupported ancestor qualifier '{}' in '{}'", part, raw))?;
            ancestor_classes.push(class.to_string());
        }

        let target = parse_simple(target_part[0])
            .map_err(|e| format!("bad selector '{}': {}", raw, e))?;

        Ok(Self {
            ancestor_classes,
            target,
            raw: raw.to_string(),
        })
    }

    /// Whether this pattern selects the given captured field.
    pub fn matches(&self, field: &FormField) -> bool {
        let t = &self.target;
        if let Some(tag) = &t.tag {
            if !field.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &t.id {
            if field.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !t.classes.iter().all(|c| field.classes.iter().any(|fc| fc == c)) {
            return false;
        }
        for (attr, value) in &t.attrs {
            let actual = match attr.as_str() {
                "name" => field.name.as_deref(),
                "type" => field.input_type.as_deref(),
                "id" => field.id.as_deref(),
                "placeholder" => field.placeholder.as_deref(),
                // Unknown attribute tests never match rather than silently
                // matching everything.
                _ => return false,
            };
            if actual != Some(value.as_str()) {
                return false;
            }
        }
        self.ancestor_classes
            .iter()
            .all(|c| field.ancestor_classes.iter().any(|ac| ac == c))
    }
}

fn parse_simple(raw: &str) -> Result<SimpleSelector, String> {
    let mut sel = SimpleSelector::default();
    let mut chars = raw.chars().peekable();

    let mut tag = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '-' {
            tag.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if !tag.is_empty() {
        sel.tag = Some(tag.to_ascii_lowercase());
    }

    while let Some(c) = chars.next() {
        match c {
            '#' => {
                let ident = take_ident(&mut chars);
                if ident.is_empty() {
                    return Err("empty id".to_string());
                }
                sel.id = Some(ident);
            }
            '.' => {
                let ident = take_ident(&mut chars);
                if ident.is_empty() {
                    return Err("empty class".to_string());
                }
                sel.classes.push(ident);
            }
            '[' => {
                let mut body = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    body.push(c);
                }
                let (attr, value) = body
                    .split_once('=')
                    .ok_or_else(|| format!("attribute test without value: [{}]", body))?;
                let value = value.trim_matches(|c| c == '\'' || c == '"');
                sel.attrs.push((attr.trim().to_string(), value.to_string()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    if sel.tag.is_none() && sel.id.is_none() && sel.classes.is_empty() && sel.attrs.is_empty() {
        return Err("selector selects nothing".to_string());
    }
    Ok(sel)
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            ident.push(c);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::snapshot::FormField;

    fn field(tag: &str, name: Option<&str>, id: Option<&str>) -> FormField {
        FormField {
            tag: tag.to_string(),
            name: name.map(str::to_string),
            id: id.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn parses_the_catalog_dialect() {
        let p = SelectorPattern::parse("input[name='business_name']").unwrap();
        assert_eq!(p.target.tag.as_deref(), Some("input"));
        assert_eq!(p.target.attrs, vec![("name".to_string(), "business_name".to_string())]);

        let p = SelectorPattern::parse("#zip").unwrap();
        assert_eq!(p.target.id.as_deref(), Some("zip"));

        let p = SelectorPattern::parse(".business-name input").unwrap();
        assert_eq!(p.ancestor_classes, vec!["business-name".to_string()]);
        assert_eq!(p.target.tag.as_deref(), Some("input"));

        assert!(SelectorPattern::parse("").is_err());
        assert!(SelectorPattern::parse("div > input").is_err());
    }

    #[test]
    fn attribute_and_id_matching() {
        let p = SelectorPattern::parse("input[name='phone']").unwrap();
        assert!(p.matches(&field("input", Some("phone"), None)));
        assert!(!p.matches(&field("input", Some("fax"), None)));
        assert!(!p.matches(&field("select", Some("phone"), None)));

        let p = SelectorPattern::parse("input#email").unwrap();
        assert!(p.matches(&field("input", None, Some("email"))));
        assert!(!p.matches(&field("input", None, Some("email2"))));
    }

    #[test]
    fn ancestor_class_qualifier_matches_against_captured_ancestors() {
        let p = SelectorPattern::parse(".address input").unwrap();
        let mut f = field("input", None, None);
        assert!(!p.matches(&f));
        f.ancestor_classes = vec!["form-row".to_string(), "address".to_string()];
        assert!(p.matches(&f));
    }

    #[test]
    fn type_test_reads_the_input_type() {
        let p = SelectorPattern::parse("input[type='email']").unwrap();
        let mut f = field("input", Some("contact"), None);
        f.input_type = Some("email".to_string());
        assert!(p.matches(&f));
        f.input_type = Some("text".to_string());
        assert!(!p.matches(&f));
    }
}
