//! Message template rendering.
//!
//! Templates use `{{name}}` placeholders. Unknown names render as an empty
//! string; the result is whitespace-normalized so a missing variable never
//! leaves a double space behind.

use crate::models::Vars;
use regex::{Captures, Regex};
use std::sync::LazyLock;

// NOTE: expect() is acceptable here: the patterns are literals.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("Invalid regex: placeholder"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex: whitespace run"));

/// Renders `template` against `vars`.
pub fn render(template: &str, vars: &Vars) -> String {
    let substituted = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        vars.get(&caps[1]).cloned().unwrap_or_default()
    });
    WHITESPACE.replace_all(&substituted, " ").trim().to_string()
}
