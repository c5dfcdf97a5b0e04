//! Rendering of alert message templates.
//!
//! Only `{{ $labels.<name> }}` placeholders are substituted. A placeholder
//! naming a label the alert does not carry is left in the output verbatim.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::types::Labels;

static LABEL_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\$labels\.([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").unwrap_or_else(|_| unreachable!())
});

/// Renders `template`, replacing label placeholders with values from `labels`.
#[must_use]
pub fn render_message(template: &str, labels: &Labels) -> String {
    LABEL_PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            labels
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
