//! Display tree derived from a `StructuredValue` and the set of expanded paths.
//!
//! Nothing here is cached. Every call walks the whole value, so node ids and
//! paths always describe the current structure.

use std::collections::HashSet;

use serde::Serialize;

use crate::types::{StructuredValue, ValueType};

use super::path::{join_path, Path};

/// Id given to a node standing for a scalar document root.
pub const ROOT_ID: &str = "root";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Present for leaves only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<StructuredValue>,
    pub path: Path,
    pub expanded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

/// Project the nodes under `path`.
///
/// Containers yield one node per child. A scalar yields a single leaf standing
/// for itself, labelled by its last path segment (or `null`/`root` at the top).
pub fn project(value: &StructuredValue, path: &[String], expanded: &HashSet<String>) -> Vec<TreeNode> {
    match value {
        StructuredValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                child_node(item, path, index.to_string(), format!("[{index}]"), expanded)
            })
            .collect(),
        StructuredValue::Object(map) => map
            .iter()
            .map(|(key, item)| child_node(item, path, key.clone(), key.clone(), expanded))
            .collect(),
        leaf => {
            let id = if path.is_empty() {
                ROOT_ID.to_string()
            } else {
                join_path(path)
            };
            let label = match path.last() {
                Some(segment) => segment.clone(),
                None if matches!(leaf, StructuredValue::Null) => "null".to_string(),
                None => ROOT_ID.to_string(),
            };
            vec![TreeNode {
                id,
                label,
                value_type: leaf.value_type(),
                value: Some(leaf.clone()),
                path: path.to_vec(),
                expanded: false,
                children: None,
            }]
        }
    }
}

fn child_node(
    item: &StructuredValue,
    parent: &[String],
    segment: String,
    label: String,
    expanded: &HashSet<String>,
) -> TreeNode {
    let mut path = parent.to_vec();
    path.push(segment);
    let id = join_path(&path);

    let (value, children) = if item.is_container() {
        (None, Some(project(item, &path, expanded)))
    } else {
        (Some(item.clone()), None)
    };

    TreeNode {
        expanded: expanded.contains(&id),
        id,
        label,
        value_type: item.value_type(),
        value,
        path,
        children,
    }
}

/// Joined path of every node below the root, in traversal order.
pub fn collect_all_paths(value: &StructuredValue) -> Vec<String> {
    let mut out = Vec::new();
    collect_into(value, &mut Vec::new(), &mut out);
    out
}

fn collect_into(value: &StructuredValue, path: &mut Path, out: &mut Vec<String>) {
    let mut visit = |segment: String, item: &StructuredValue, out: &mut Vec<String>| {
        path.push(segment);
        out.push(join_path(path));
        collect_into(item, path, out);
        path.pop();
    };
    match value {
        StructuredValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                visit(index.to_string(), item, out);
            }
        }
        StructuredValue::Object(map) => {
            for (key, item) in map {
                visit(key.clone(), item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> StructuredValue {
        StructuredValue::from(json!({"name": "x", "tags": ["a", {"k": null}]}))
    }

    #[test]
    fn objects_and_arrays_project_in_order() {
        let nodes = project(&sample(), &[], &HashSet::new());
        let labels: Vec<_> = nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["name", "tags"]);

        let tags = &nodes[1];
        assert_eq!(tags.value_type, ValueType::Array);
        assert!(tags.value.is_none());
        let children = tags.children.as_ref().unwrap();
        assert_eq!(children[0].label, "[0]");
        assert_eq!(children[1].id, "tags.1");
        assert_eq!(children[1].path, vec!["tags".to_string(), "1".to_string()]);
        assert!(children[0].children.is_none());
    }

    #[test]
    fn expanded_is_a_membership_test() {
        let expanded: HashSet<String> = ["tags".to_string(), "tags.1".to_string()].into();
        let nodes = project(&sample(), &[], &expanded);
        assert!(!nodes[0].expanded);
        assert!(nodes[1].expanded);
        let inner = &nodes[1].children.as_ref().unwrap()[1];
        assert!(inner.expanded);
    }

    #[test]
    fn scalar_roots_become_single_leaves() {
        let nodes = project(&StructuredValue::Null, &[], &HashSet::new());
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, ROOT_ID);
        assert_eq!(nodes[0].label, "null");
        assert_eq!(nodes[0].value_type, ValueType::Null);

        let nodes = project(&StructuredValue::from(5), &[], &HashSet::new());
        assert_eq!(nodes[0].label, ROOT_ID);
        assert_eq!(nodes[0].value, Some(StructuredValue::from(5)));
    }

    #[test]
    fn serializes_with_type_tag() {
        let value = StructuredValue::from(json!({"a": true}));
        let nodes = project(&value, &[], &HashSet::new());
        let text = serde_json::to_string(&nodes).unwrap();
        assert_eq!(
            text,
            r#"[{"id":"a","label":"a","type":"boolean","value":true,"path":["a"],"expanded":false}]"#
        );
    }

    #[test]
    fn collects_every_descendant_path() {
        assert_eq!(
            collect_all_paths(&sample()),
            vec!["name", "tags", "tags.0", "tags.1", "tags.1.k"]
        );
        assert!(collect_all_paths(&StructuredValue::from("x")).is_empty());
    }
}
