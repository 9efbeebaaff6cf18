//! Going back from dotted keys to nested mappings, and slicing a [`Flat`]
//! mapping by key prefix.
//!
//! `{"database.url": "pg://", "port": 1}` unflattens to
//! `{"database": {"url": "pg://"}, "port": 1}`. The inverse is
//! [`flatten`](crate::flatten::flatten).

use serde_json::Value;

use crate::error::ConfigsError;
use crate::types::{Flat, Mapping};

/// Check that `key` is a well-formed dotted key: non-empty, no empty segments.
pub fn validate_key(key: &str) -> Result<(), ConfigsError> {
    if key.is_empty() {
        return Err(ConfigsError::invalid_key(key, "key must not be empty"));
    }
    if key.split('.').any(str::is_empty) {
        return Err(ConfigsError::invalid_key(key, "key contains an empty segment"));
    }
    Ok(())
}

/// Entries of `flat` below `prefix`, with `prefix.` stripped from their keys.
///
/// `prefix` may itself be dotted; an entry stored exactly at `prefix` is a
/// terminal, not part of the subtree, and is left out.
pub fn subtree(flat: &Flat, prefix: &str) -> Flat {
    let needle = format!("{prefix}.");
    flat.iter()
        .filter_map(|(k, v)| k.strip_prefix(&needle).map(|rest| (rest.to_string(), v.clone())))
        .collect()
}

/// Rebuild the nested mapping a flattened mapping stands for.
pub fn unflatten(flat: &Flat) -> Mapping {
    let mut out = Mapping::new();
    for (dotted_key, value) in flat {
        insert_nested(&mut out, dotted_key, value.clone());
    }
    out
}

fn insert_nested(mapping: &mut Mapping, dotted_key: &str, value: Value) {
    let mut segments = dotted_key.split('.').peekable();
    let mut current = mapping;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let slot = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Mapping::new()));
        if !slot.is_object() {
            *slot = Value::Object(Mapping::new());
        }
        current = match slot {
            Value::Object(inner) => inner,
            _ => return,
        };
    }
}

/// Merge freshly flattened `entries` into `flat`, last write wins.
///
/// A path is either a terminal or a subtree, never both: each inserted key
/// evicts terminals stored at any of its proper prefixes and every entry
/// below it. Siblings are kept.
pub fn merge_entries(flat: &mut Flat, entries: Flat) {
    for (key, value) in entries {
        for (idx, _) in key.match_indices('.') {
            flat.remove(&key[..idx]);
        }
        let below = format!("{key}.");
        flat.retain(|k, _| !k.starts_with(&below));
        flat.insert(key, value);
    }
}
