//! Structural access to nested state values.
//!
//! State is an opaque `serde_json::Value` tree. These helpers read, write and
//! delete at a segment path, creating intermediate objects on write. Array
//! elements are addressed by numeric segments.

use crate::error::{Result, StateError};
use crate::path::Path;
use serde_json::{Map, Value};

/// Read the value at `segments`, `None` if any segment is absent.
pub fn get_at<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |current, segment| child(current, segment))
}

fn child<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(current: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match current {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(arr) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| arr.get_mut(i)),
        _ => None,
    }
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// Writing the root replaces it wholesale. Scalars found on the way are
/// replaced by objects; arrays accept numeric segments up to one past the
/// end (which appends).
pub fn set_at(root: &mut Value, path: &Path, value: Value) -> Result<()> {
    set_in(root, path.segments(), value, path)
}

fn set_in(current: &mut Value, segments: &[String], value: Value, full: &Path) -> Result<()> {
    let Some((segment, rest)) = segments.split_first() else {
        *current = value;
        return Ok(());
    };

    if let Value::Array(arr) = current {
        let index = segment
            .parse::<usize>()
            .map_err(|_| StateError::TypeMismatch {
                path: full.to_string(),
                expected: "object",
                found: "array",
            })?;

        if index == arr.len() {
            arr.push(Value::Null);
        } else if index > arr.len() {
            return Err(StateError::IndexOutOfBounds {
                path: full.to_string(),
                index,
                len: arr.len(),
            });
        }
        return set_in(&mut arr[index], rest, value, full);
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        if rest.is_empty() {
            map.insert(segment.clone(), value);
        } else {
            let entry = map.entry(segment.clone()).or_insert(Value::Null);
            return set_in(entry, rest, value, full);
        }
    }
    Ok(())
}

/// Delete the value at `segments`. Returns true if something was removed.
///
/// With `prune_empty_parents`, containers left empty by the removal are
/// removed as well, up to (not including) the root. Deleting the root path
/// is a no-op here; callers reset the root themselves.
pub fn delete_at(root: &mut Value, segments: &[String], prune_empty_parents: bool) -> bool {
    match segments {
        [] => false,
        [leaf] => remove_child(root, leaf),
        [head, rest @ ..] => {
            let Some(next) = child_mut(root, head) else {
                return false;
            };
            let removed = delete_at(next, rest, prune_empty_parents);
            if removed && prune_empty_parents && is_empty_container(next) {
                remove_child(root, head);
            }
            removed
        }
    }
}

fn remove_child(current: &mut Value, segment: &str) -> bool {
    match current {
        Value::Object(map) => map.remove(segment).is_some(),
        Value::Array(arr) => match segment.parse::<usize>() {
            Ok(i) if i < arr.len() => {
                arr.remove(i);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        _ => false,
    }
}

/// Shallow object merge: keys of `new` override keys of `old`.
///
/// Anything other than two objects yields `new` unchanged.
pub fn merge_shallow(old: &Value, new: Value) -> Value {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => {
            let mut merged = old.clone();
            merged.extend(new);
            Value::Object(merged)
        }
        (_, new) => new,
    }
}
