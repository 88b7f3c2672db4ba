//! Builds hierarchical JSON documents from flat path-value lists.
//!
//! Plugins validate whole documents, while changes carry individual leaves.
//! `/a/b[name=x]/c = 1` becomes:
//!
//! ```json
//! {"a": {"b": [{"name": "x", "c": 1}]}}
//! ```
//!
//! Keyed elements become arrays of objects, one entry per distinct key set,
//! with the key values written as string members of the entry.

use crate::error::{ControllerError, ControllerResult};
use cfgplane_types::{Path, PathElem, PathValue};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Builds one document from `values`.
///
/// Values are applied in order, so a later value at the same path overrides
/// an earlier one. Removed values are left out.
pub fn build_document(values: &[PathValue]) -> ControllerResult<Value> {
    let mut root = Map::new();
    for value in values.iter().filter(|v| !v.removed) {
        let path = Path::parse(&value.path)?;
        insert(&mut root, path.elems(), value.value.to_json()).map_err(|reason| {
            ControllerError::InvalidPath {
                path: value.path.clone(),
                reason: reason.to_string(),
            }
        })?;
    }
    Ok(Value::Object(root))
}

fn insert(node: &mut Map<String, Value>, elems: &[PathElem], leaf: Value) -> Result<(), &'static str> {
    let Some((elem, rest)) = elems.split_first() else {
        return Err("path has no elements");
    };

    if rest.is_empty() {
        if !elem.keys.is_empty() {
            return Err("a keyed element cannot hold a value");
        }
        node.insert(elem.name.clone(), leaf);
        return Ok(());
    }

    let child = if elem.keys.is_empty() {
        object_slot(node.entry(elem.name.clone()).or_insert(Value::Null))
    } else {
        list_entry(node.entry(elem.name.clone()).or_insert(Value::Null), &elem.keys)
    };
    insert(child, rest, leaf)
}

/// Returns `slot` as an object, replacing whatever leaf was there.
fn object_slot(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just made an object"),
    }
}

/// Returns the list entry matching `keys`, creating it when missing.
fn list_entry<'a>(slot: &'a mut Value, keys: &BTreeMap<String, String>) -> &'a mut Map<String, Value> {
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    let Value::Array(entries) = slot else {
        unreachable!("slot was just made an array");
    };

    let position = entries.iter().position(|entry| keys_match(entry, keys));
    let position = match position {
        Some(i) => i,
        None => {
            let entry = keys
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            entries.push(Value::Object(entry));
            entries.len() - 1
        }
    };
    object_slot(&mut entries[position])
}

fn keys_match(entry: &Value, keys: &BTreeMap<String, String>) -> bool {
    entry.as_object().is_some_and(|map| {
        keys.iter()
            .all(|(k, v)| map.get(k).and_then(Value::as_str) == Some(v.as_str()))
    })
}
