//! Structured capture of a live submission form.
//!
//! One injected script walks `document.forms` and returns everything the
//! resolver needs as plain JSON. Keeping the capture separate from
//! resolution means every tier works on a value type and needs no browser.

use serde::{Deserialize, Serialize};

/// What kind of control a field is, for value-writing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldControl {
    Text,
    Textarea,
    Select,
    Checkbox,
}

/// One form control as captured from the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormField {
    /// Lowercase tag name: `input`, `textarea` or `select`.
    pub tag: String,
    pub input_type: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub classes: Vec<String>,
    pub placeholder: Option<String>,
    /// Text of associated `<label>` elements and aria-describedby targets.
    pub labels: Vec<String>,
    pub aria_label: Option<String>,
    pub autocomplete: Option<String>,
    pub required: bool,
    pub visible: bool,
    pub enabled: bool,
    /// Class names collected walking up the ancestor chain.
    pub ancestor_classes: Vec<String>,
    /// Positional path usable as a concrete selector when the element has
    /// neither id nor name.
    pub css_path: String,
    /// Option values for selects.
    pub options: Vec<String>,
}

impl FormField {
    pub fn control(&self) -> FieldControl {
        match self.tag.as_str() {
            "textarea" => FieldControl::Textarea,
            "select" => FieldControl::Select,
            _ => match self.input_type.as_deref() {
                Some("checkbox") => FieldControl::Checkbox,
                _ => FieldControl::Text,
            },
        }
    }

    pub fn is_fillable(&self) -> bool {
        self.visible && self.enabled
    }

    /// Concrete selector for driving this element in the page.
    pub fn concrete_selector(&self) -> String {
        if let Some(id) = &self.id {
            return format!("#{}", id);
        }
        if let Some(name) = &self.name {
            return format!("{}[name='{}']", self.tag, name);
        }
        self.css_path.clone()
    }
}

/// A submit control discovered inside the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitCandidate {
    pub selector: String,
    pub text: String,
}

/// Everything captured from the submission page in one evaluate call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSnapshot {
    pub url: String,
    pub fields: Vec<FormField>,
    pub submitters: Vec<SubmitCandidate>,
}

impl FormSnapshot {
    pub fn fillable_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|f| f.is_fillable())
    }
}

/// Returns `FormSnapshot`-shaped JSON for all forms on the page.
pub const FORM_EXTRACTION_SCRIPT: &str = r#"
(() => {
  const toPath = (el) => {
    if (el.id) return `${el.nodeName.toLowerCase()}#${el.id}`;
    const parts = [];
    let current = el;
    while (current && current.nodeType === Node.ELEMENT_NODE) {
      let part = current.nodeName.toLowerCase();
      const parent = current.parentElement;
      if (parent) {
        const siblings = Array.from(parent.children).filter(c => c.nodeName === current.nodeName);
        if (siblings.length > 1) part += `:nth-of-type(${siblings.indexOf(current) + 1})`;
      }
      parts.unshift(part);
      current = parent;
    }
    return parts.join(' > ');
  };

  const clean = (t) => (t || '').replace(/\s+/g, ' ').trim();

  const readLabels = (el) => {
    const labels = [];
    if (el.labels) el.labels.forEach(l => labels.push(clean(l.innerText || l.textContent)));
    const describedBy = el.getAttribute('aria-describedby');
    if (describedBy) describedBy.split(' ').forEach(id => {
      const d = document.getElementById(id);
      if (d) labels.push(clean(d.innerText || d.textContent));
    });
    return labels.filter(t => t.length);
  };

  const ancestorClasses = (el) => {
    const classes = [];
    for (let p = el.parentElement; p; p = p.parentElement) {
      if (p.classList) classes.push(...p.classList);
    }
    return classes;
  };

  const isVisible = (el) => {
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  };

  const fields = [];
  const submitters = [];
  Array.from(document.forms || []).forEach(form => {
    Array.from(form.elements || []).forEach(el => {
      const tag = el.tagName.toLowerCase();
      if (!['input', 'textarea', 'select'].includes(tag)) return;
      const type = (el.getAttribute('type') || (tag === 'input' ? 'text' : '')).toLowerCase();
      if (['submit', 'button', 'hidden', 'image', 'reset'].includes(type)) return;
      fields.push({
        tag,
        input_type: type || null,
        id: el.id || null,
        name: el.name || null,
        classes: Array.from(el.classList || []),
        placeholder: el.placeholder || null,
        labels: readLabels(el),
        aria_label: clean(el.getAttribute('aria-label')) || null,
        autocomplete: el.getAttribute('autocomplete') || null,
        required: el.required === true || el.getAttribute('aria-required') === 'true',
        visible: isVisible(el),
        enabled: !el.disabled && !el.readOnly,
        ancestor_classes: ancestorClasses(el),
        css_path: toPath(el),
        options: tag === 'select' ? Array.from(el.options).map(o => o.value || o.text) : [],
      });
    });
    Array.from(form.querySelectorAll('button, input[type="submit"], input[type="button"]')).forEach(el => {
      submitters.push({
        selector: toPath(el),
        text: clean(el.innerText || el.textContent || el.value),
      });
    });
  });

  return { url: window.location.href, fields, submitters };
})()
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_kind_follows_tag_and_type() {
        let mut f = FormField {
            tag: "input".to_string(),
            ..Default::default()
        };
        assert_eq!(f.control(), FieldControl::Text);
        f.input_type = Some("checkbox".to_string());
        assert_eq!(f.control(), FieldControl::Checkbox);
        f.tag = "select".to_string();
        assert_eq!(f.control(), FieldControl::Select);
        f.tag = "textarea".to_string();
        assert_eq!(f.control(), FieldControl::Textarea);
    }

    #[test]
    fn concrete_selector_prefers_id_then_name_then_path() {
        let mut f = FormField {
            tag: "input".to_string(),
            css_path: "form > input:nth-of-type(2)".to_string(),
            ..Default::default()
        };
        assert_eq!(f.concrete_selector(), "form > input:nth-of-type(2)");
        f.name = Some("phone".to_string());
        assert_eq!(f.concrete_selector(), "input[name='phone']");
        f.id = Some("phone-input".to_string());
        assert_eq!(f.concrete_selector(), "#phone-input");
    }

    #[test]
    fn snapshot_deserializes_from_extraction_shape() {
        let raw = serde_json::json!({
            "url": "https://example.com/submit",
            "fields": [{
                "tag": "input",
                "input_type": "text",
                "name": "business_name",
                "visible": true,
                "enabled": true,
                "css_path": "form > input:nth-of-type(1)"
            }],
            "submitters": [{"selector": "form > button", "text": "Submit listing"}]
        });
        let snapshot: FormSnapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snapshot.fields.len(), 1);
        assert!(snapshot.fields[0].is_fillable());
        assert_eq!(snapshot.submitters[0].text, "Submit listing");
    }
}
