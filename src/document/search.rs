//! Linear search over keys and leaf values.

use crate::types::StructuredValue;

use super::path::Path;

/// Paths whose object key or leaf value contains `query`, ignoring case.
///
/// Results come out in traversal order. A node matching on both its key and
/// its value is reported once. The empty query matches nothing.
pub fn find(value: &StructuredValue, query: &str) -> Vec<Path> {
    let mut results = Vec::new();
    if query.is_empty() {
        return results;
    }
    let needle = query.to_lowercase();
    walk(value, &mut Vec::new(), &needle, false, &mut results);
    results
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn walk(
    value: &StructuredValue,
    path: &mut Path,
    needle: &str,
    key_matched: bool,
    results: &mut Vec<Path>,
) {
    match value {
        StructuredValue::Array(items) => {
            if key_matched {
                results.push(path.clone());
            }
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                walk(item, path, needle, false, results);
                path.pop();
            }
        }
        StructuredValue::Object(map) => {
            if key_matched {
                results.push(path.clone());
            }
            for (key, item) in map {
                path.push(key.clone());
                walk(item, path, needle, contains(key, needle), results);
                path.pop();
            }
        }
        leaf => {
            let value_matched = leaf.leaf_text().is_some_and(|text| contains(&text, needle));
            if key_matched || value_matched {
                results.push(path.clone());
            }
        }
    }
}
