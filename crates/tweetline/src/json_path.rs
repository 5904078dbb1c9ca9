//! Tolerant lookups into untyped JSON trees.
//!
//! Platform payloads change shape without notice. Every nested read goes
//! through [`try_get`], which reports "not found" for a missing key, an
//! out-of-range index, or a type mismatch instead of panicking.

use serde_json::Value;

/// One step of a path: an object key or an array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seg<'a> {
    Key(&'a str),
    Index(usize),
}

/// Walk `path` from `tree`, returning the value at the end or `None`.
pub fn try_get<'v>(tree: &'v Value, path: &[Seg<'_>]) -> Option<&'v Value> {
    path.iter().try_fold(tree, |node, seg| match (seg, node) {
        (Seg::Key(key), Value::Object(map)) => map.get(*key),
        (Seg::Index(i), Value::Array(items)) => items.get(*i),
        _ => None,
    })
}

/// String at `key`, `None` when absent, null, or not a string.
pub fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)?.as_str().map(str::to_string)
}

/// Non-negative count at `key`; numeric strings are accepted, anything else is `0`.
pub fn count_field(obj: &Value, key: &str) -> u64 {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
