//! `captureState` extraction from requests.

use serde_json::{Map, Value};

use scenarist_core::path::StatePath;

use super::context::HttpRequestContext;
use crate::state::tree;

/// Extracts the value named by a capture source expression.
///
/// Sources are `body`, `body.<path>`, `headers.<name>`, `query.<name>`
/// and `params.<name>`. Header names are matched case-insensitively.
/// Returns `None` when the source is unknown or the value is absent.
#[must_use]
pub fn extract(
    ctx: &HttpRequestContext,
    params: &Map<String, Value>,
    source: &str,
) -> Option<Value> {
    let (root, rest) = source.split_once('.').unwrap_or((source, ""));
    match root {
        "body" => {
            let body = ctx.body.as_ref()?;
            if rest.is_empty() {
                return Some(body.clone());
            }
            let path = StatePath::parse(rest).ok()?;
            tree::lookup(body, path.segments())
        }
        "headers" if !rest.is_empty() => ctx
            .headers
            .get(&rest.to_ascii_lowercase())
            .map(|v| Value::String(v.clone())),
        "query" if !rest.is_empty() => ctx.query.get(rest).map(|v| Value::String(v.clone())),
        "params" if !rest.is_empty() => params.get(rest).cloned(),
        _ => None,
    }
}
