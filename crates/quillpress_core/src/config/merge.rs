//! Deep merge primitive for configuration trees.
//!
//! # Invariants
//! - Objects always merge recursively; keys missing from `incoming` survive.
//! - Conflicting scalars always take the `incoming` side.
//! - Arrays are replaced wholesale in [`MergeMode::Replace`] and concatenated
//!   without duplicate items in [`MergeMode::Merge`].

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Replace,
    Merge,
}

impl MergeMode {
    /// Maps an `append` flag to its merge mode.
    pub fn from_append(append: bool) -> Self {
        if append {
            Self::Merge
        } else {
            Self::Replace
        }
    }
}

/// Merges `incoming` over `base` and returns the combined value.
pub fn deep_merge(base: Value, incoming: Value, mode: MergeMode) -> Value {
    match (base, incoming) {
        (Value::Object(mut base), Value::Object(incoming)) => {
            for (key, value) in incoming {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value, mode),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (Value::Array(mut base), Value::Array(incoming)) if mode == MergeMode::Merge => {
            for item in incoming {
                if !base.contains(&item) {
                    base.push(item);
                }
            }
            Value::Array(base)
        }
        (_, incoming) => incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::{deep_merge, MergeMode};
    use serde_json::json;

    #[test]
    fn replace_mode_lets_incoming_scalars_win() {
        let merged = deep_merge(json!({"a": 1, "b": 2}), json!({"b": 3}), MergeMode::Replace);
        assert_eq!(merged, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn replace_mode_replaces_arrays() {
        let merged = deep_merge(
            json!({"hosts": ["a", "b"], "nested": {"x": 1}}),
            json!({"hosts": ["c"], "nested": {"y": 2}}),
            MergeMode::Replace,
        );
        assert_eq!(merged, json!({"hosts": ["c"], "nested": {"x": 1, "y": 2}}));
    }

    #[test]
    fn merge_mode_concatenates_arrays_without_duplicates() {
        let merged = deep_merge(
            json!({"hosts": ["a", "b"], "port": 1}),
            json!({"hosts": ["b", "c"], "port": 2}),
            MergeMode::Merge,
        );
        assert_eq!(merged, json!({"hosts": ["a", "b", "c"], "port": 2}));
    }

    #[test]
    fn type_mismatch_takes_incoming() {
        let merged = deep_merge(json!({"a": {"b": 1}}), json!({"a": [1]}), MergeMode::Merge);
        assert_eq!(merged, json!({"a": [1]}));
    }
}
