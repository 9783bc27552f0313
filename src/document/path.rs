//! Path addressing over `StructuredValue`.
//!
//! A path is an ordered list of segments: object keys, or base-10 array
//! indices written as strings. The empty path is the root. Every function here
//! is pure; `set` and `remove` refuse the empty path because replacing the root
//! is the caller's job.

use crate::types::StructuredValue;

/// Owned path. Borrowed paths are `&[String]`.
pub type Path = Vec<String>;

/// Separator used when a path is rendered as a single string id.
pub const PATH_SEPARATOR: char = '.';

/// Render a path as the id used by the tree projection and expanded-path set.
///
/// Keys may contain the separator, so distinct paths can share an id:
/// `["a.b"]` and `["a", "b"]` both render as `a.b` and toggle together.
pub fn join_path(path: &[String]) -> String {
    path.join(&PATH_SEPARATOR.to_string())
}

/// Parse a path from its joined form. The empty string is the root.
pub fn split_path(joined: &str) -> Path {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(PATH_SEPARATOR).map(str::to_string).collect()
}

/// True when `path` equals `ancestor` or lies underneath it.
pub fn is_prefix(ancestor: &[String], path: &[String]) -> bool {
    path.len() >= ancestor.len() && path[..ancestor.len()] == *ancestor
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn child<'a>(value: &'a StructuredValue, segment: &str) -> Option<&'a StructuredValue> {
    match value {
        StructuredValue::Array(items) => items.get(parse_index(segment)?),
        StructuredValue::Object(map) => map.get(segment),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut StructuredValue, segment: &str) -> Option<&'a mut StructuredValue> {
    match value {
        StructuredValue::Array(items) => items.get_mut(parse_index(segment)?),
        StructuredValue::Object(map) => map.get_mut(segment),
        _ => None,
    }
}

/// Resolve `path`. Returns `None` when a step is missing or not a container.
pub fn get<'a>(value: &'a StructuredValue, path: &[String]) -> Option<&'a StructuredValue> {
    path.iter().try_fold(value, |current, segment| child(current, segment))
}

pub fn get_mut<'a>(value: &'a mut StructuredValue, path: &[String]) -> Option<&'a mut StructuredValue> {
    let mut current = value;
    for segment in path {
        current = child_mut(current, segment)?;
    }
    Some(current)
}

/// Split a non-empty path into its parent and last segment.
pub fn split_last(path: &[String]) -> Option<(&[String], &str)> {
    let (last, parent) = path.split_last()?;
    Some((parent, last.as_str()))
}

/// Write `new_value` at `path`. Objects gain the key if it is new; arrays accept
/// an existing index or exactly one past the end. Returns `false` without
/// writing when the parent does not resolve to a container.
pub fn set(value: &mut StructuredValue, path: &[String], new_value: StructuredValue) -> bool {
    let Some((parent, last)) = split_last(path) else {
        return false;
    };
    match get_mut(value, parent) {
        Some(StructuredValue::Object(map)) => {
            map.insert(last.to_string(), new_value);
            true
        }
        Some(StructuredValue::Array(items)) => match parse_index(last) {
            Some(i) if i < items.len() => {
                items[i] = new_value;
                true
            }
            Some(i) if i == items.len() => {
                items.push(new_value);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Remove and return the value at `path`. Array elements after it shift down by
/// one; object keys keep their relative order.
pub fn remove(value: &mut StructuredValue, path: &[String]) -> Option<StructuredValue> {
    let (parent, last) = split_last(path)?;
    match get_mut(value, parent)? {
        StructuredValue::Object(map) => map.shift_remove(last),
        StructuredValue::Array(items) => {
            let i = parse_index(last)?;
            (i < items.len()).then(|| items.remove(i))
        }
        _ => None,
    }
}

/// Array index addressed by the last segment, if the parent is an array.
pub fn array_index(value: &StructuredValue, path: &[String]) -> Option<usize> {
    let (parent, last) = split_last(path)?;
    match get(value, parent)? {
        StructuredValue::Array(items) => parse_index(last).filter(|&i| i < items.len()),
        _ => None,
    }
}
