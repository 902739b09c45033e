//! Key path resolution and nested traversal.
//!
//! Callers address values with their own delimiter (`server.port`,
//! `server/port`, ...). Internally every key is canonical: segments joined
//! with [`SEPARATOR`].

use serde_json::{Map, Value};

/// Canonical separator between key segments.
pub const SEPARATOR: &str = ":";

/// Rewrite `raw` from the caller's delimiter to the canonical form.
///
/// Keys that do not contain `delimiter` are returned unchanged, so an
/// already-canonical key passes through untouched.
pub fn resolve_key(raw: &str, delimiter: &str) -> String {
    if delimiter.is_empty() || !raw.contains(delimiter) {
        return raw.to_string();
    }
    raw.split(delimiter).collect::<Vec<_>>().join(SEPARATOR)
}

/// Split a canonical key into its segments.
pub fn segments(canonical: &str) -> impl Iterator<Item = &str> {
    canonical.split(SEPARATOR)
}

/// Step one level into `value`. Only mappings can be stepped into.
pub fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    value.as_object()?.get(segment)
}

/// Walk every segment of `canonical` starting at `root`.
///
/// Returns `None` as soon as a segment is absent or the current value is
/// not a mapping.
pub fn traverse<'a>(root: &'a Value, canonical: &str) -> Option<&'a Value> {
    segments(canonical).try_fold(root, child)
}

/// Insert `value` at `canonical` below `root`, creating intermediate
/// mappings and replacing any scalar that is in the way.
pub fn insert(root: &mut Map<String, Value>, canonical: &str, value: Value) {
    let mut parts: Vec<&str> = segments(canonical).collect();
    let Some(last) = parts.pop() else {
        return;
    };

    let mut current = root;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(map) = entry else {
            return;
        };
        current = map;
    }
    current.insert(last.to_string(), value);
}
