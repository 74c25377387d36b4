//! Dotted key paths over `serde_json::Value` trees.
//!
//! `a.b.0.c` walks object keys and, for numeric segments, existing array
//! positions. An empty key addresses the root.

use serde_json::{Map, Value};

fn segments(key: &str) -> Vec<&str> {
    key.split('.').filter(|segment| !segment.is_empty()).collect()
}

/// Returns the value stored at `key`, if any.
pub fn get_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(key) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn has_path(root: &Value, key: &str) -> bool {
    get_path(root, key).is_some()
}

/// Writes `value` at `key`, creating intermediate objects as needed.
///
/// A non-container value found on the way is replaced by an object.
pub fn set_path(root: &mut Value, key: &str, value: Value) {
    set_segments(root, &segments(key), value);
}

fn set_segments(current: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *current = value;
        return;
    };

    if let Value::Array(items) = current {
        if let Ok(index) = head.parse::<usize>() {
            if index == items.len() {
                items.push(Value::Null);
            }
            if let Some(item) = items.get_mut(index) {
                set_segments(item, rest, value);
                return;
            }
        }
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        let child = map.entry((*head).to_string()).or_insert(Value::Null);
        set_segments(child, rest, value);
    }
}

/// Removes and returns the value at `key`.
///
/// Removing the root is not supported and returns `None`.
pub fn remove_path(root: &mut Value, key: &str) -> Option<Value> {
    let segments = segments(key);
    let (last, parents) = segments.split_last()?;

    let mut current = root;
    for segment in parents {
        current = match current {
            Value::Object(map) => map.get_mut(*segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    match current {
        Value::Object(map) => map.remove(*last),
        Value::Array(items) => {
            let index = last.parse::<usize>().ok()?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}

/// Returns true when `prefix` equals `key` or is a dot-boundary prefix of it.
pub fn is_prefix_key(prefix: &str, key: &str) -> bool {
    key == prefix
        || (key.len() > prefix.len()
            && key.starts_with(prefix)
            && key.as_bytes()[prefix.len()] == b'.')
}
