//! Response template substitution.
//!
//! Replaces `{{state.path}}` and `{{params.name}}` placeholders in
//! response bodies and header values. A string that is exactly one
//! placeholder takes the referenced value with its JSON type; embedded
//! placeholders are stringified. Single pass, no re-interpolation.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::context::{Lookup, TemplateContext};
use super::matching::coerce_to_string;

/// Any `{{ ... }}` placeholder.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid regex"));

/// A string consisting of exactly one placeholder.
static PURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{\s*([^{}]+?)\s*\}\}$").expect("valid regex"));

/// Applies templates recursively through objects and arrays.
///
/// - Pure placeholder: replaced by the raw value, or `null` if missing.
/// - Embedded placeholder: replaced by the value's string form; left as
///   literal text if missing.
/// - Unknown prefixes and malformed paths are left as literal text.
/// - Non-string scalars pass through unchanged.
#[must_use]
pub fn apply_templates(value: &Value, ctx: &TemplateContext<'_>) -> Value {
    match value {
        Value::String(s) => apply_to_string(s, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| apply_templates(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), apply_templates(v, ctx)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// Applies templates to a header value, always producing a string.
#[must_use]
pub fn apply_to_header(value: &str, ctx: &TemplateContext<'_>) -> String {
    match apply_to_string(value, ctx) {
        Value::String(s) => s,
        other => coerce_to_string(&other),
    }
}

fn apply_to_string(s: &str, ctx: &TemplateContext<'_>) -> Value {
    if !s.contains("{{") {
        return Value::String(s.to_string());
    }

    if let Some(caps) = PURE_RE.captures(s) {
        return match ctx.resolve(&caps[1]) {
            Lookup::Found(v) => v,
            Lookup::Missing => Value::Null,
            Lookup::Invalid => Value::String(s.to_string()),
        };
    }

    let replaced = PLACEHOLDER_RE.replace_all(s, |caps: &regex::Captures<'_>| {
        match ctx.resolve(&caps[1]) {
            Lookup::Found(v) => coerce_to_string(&v),
            Lookup::Missing | Lookup::Invalid => caps[0].to_string(),
        }
    });
    Value::String(replaced.into_owned())
}
