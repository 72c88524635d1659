//! Recursive walker over JSON state trees.
//!
//! All traversal goes through [`StatePath`], so dangerous segments never
//! reach these functions. Reads only ever see own keys of `serde_json`
//! maps; there is no inherited lookup to leak through.

use serde_json::{Map, Value};

use scenarist_core::path::{StatePath, is_dangerous_key};

/// Reads the value at `segments` below `root`.
///
/// Numeric segments index arrays; `length` on an array yields its size.
#[must_use]
pub fn lookup(root: &Value, segments: &[String]) -> Option<Value> {
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            Value::Array(items) => {
                if segment == "length" && i == segments.len() - 1 {
                    return Some(Value::from(items.len()));
                }
                current = items.get(segment.parse::<usize>().ok()?)?;
            }
            _ => return None,
        }
    }
    Some(current.clone())
}

/// Reads the value at `path` below a top-level state map.
#[must_use]
pub fn get_path(state: &Map<String, Value>, path: &StatePath) -> Option<Value> {
    let (first, rest) = path.segments().split_first()?;
    lookup(state.get(first)?, rest)
}

/// Writes `value` at `path`, creating intermediate objects.
///
/// Non-object values found along the way are replaced by objects, except
/// arrays addressed by an in-bounds index. With an append path (`key[]`)
/// an existing array is replaced by a copy with `value` pushed; anything
/// else becomes a single-element array.
pub fn set_path(state: &mut Map<String, Value>, path: &StatePath, value: Value) {
    let mut root = Value::Object(std::mem::take(state));
    write_at(&mut root, path.segments(), path.is_append(), value);
    if let Value::Object(map) = root {
        *state = map;
    }
}

fn write_at(node: &mut Value, segments: &[String], append: bool, value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = if append {
            appended(node.take(), value)
        } else {
            value
        };
        return;
    };

    if let Value::Array(items) = node
        && let Some(index) = array_index(head, items.len())
    {
        write_at(&mut items[index], rest, append, value);
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        write_at(child, rest, append, value);
    }
}

/// Returns a new array holding `existing`'s items followed by `value`.
fn appended(existing: Value, value: Value) -> Value {
    match existing {
        Value::Array(items) => {
            let mut next = Vec::with_capacity(items.len() + 1);
            next.extend(items);
            next.push(value);
            Value::Array(next)
        }
        _ => Value::Array(vec![value]),
    }
}

fn array_index(segment: &str, len: usize) -> Option<usize> {
    segment.parse::<usize>().ok().filter(|&i| i < len)
}

/// Shallow-merges `partial` into `state`, skipping dangerous keys.
pub fn merge_shallow(state: &mut Map<String, Value>, partial: &Map<String, Value>) {
    for (key, value) in partial {
        if is_dangerous_key(key) {
            continue;
        }
        state.insert(key.clone(), value.clone());
    }
}

/// Structural equality that treats `1` and `1.0` as equal.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y
                || matches!(
                    (x.as_f64(), y.as_f64()),
                    (Some(x), Some(y)) if (x - y).abs() < f64::EPSILON
                )
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}
