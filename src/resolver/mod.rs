//! Form Resolution Engine.
//!
//! Turns a captured form snapshot plus catalog hints into concrete
//! field-to-selector bindings, tolerating markup drift through a three-tier
//! strategy (catalog hint → dynamic detection → generic fallbacks).

pub mod engine;
pub mod fallback;
pub mod selector;
pub mod snapshot;

pub use engine::{FieldBinding, FormResolver, Resolution, ResolutionTier};
pub use fallback::fallback_selectors;
pub use selector::SelectorPattern;
pub use snapshot::{
    FieldControl, FormField, FormSnapshot, SubmitCandidate, FORM_EXTRACTION_SCRIPT,
};
