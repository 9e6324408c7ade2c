//! Desired namespace hierarchies.
//!
//! A [`NamespaceNode`] describes one namespace to create together with its
//! children. It maps one-to-one onto the YAML/JSON tree documents accepted by
//! the harness:
//!
//! ```yaml
//! name: root
//! tags: ["level=0", "foo=bar"]
//! children:
//!   - name: c1
//!     children:
//!       - name: g1
//!   - name: c2
//!     tags: ["level=1"]
//! ```
//!
//! A [`NamespaceTree`] pairs a root node with the tag prefix allow list set on
//! every namespace created from it.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::provisioning::{api::CREATOR_TAG, error::ProvisionError, naming};

/// One namespace of a desired hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceNode {
    /// Simple name of the namespace (a single path segment)
    pub name: String,
    /// User tags attached to the namespace
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    /// Child namespaces, created in order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: Vec<NamespaceNode>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl NamespaceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_children(mut self, children: Vec<NamespaceNode>) -> Self {
        self.children = children;
        self
    }

    /// Parses a tree document in YAML (or JSON, which YAML accepts as well).
    pub fn from_yaml(document: &str) -> Result<Self, ProvisionError> {
        let node: Self = serde_yaml::from_str(document)?;
        node.validate()?;
        Ok(node)
    }

    pub fn from_json(document: &str) -> Result<Self, ProvisionError> {
        let node: Self = serde_json::from_str(document)?;
        node.validate()?;
        Ok(node)
    }

    /// Reads a tree document from `path`, JSON when the extension says so and
    /// YAML otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|err| {
            ProvisionError::ConfigError(format!("read {}: {err}", path.display()))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&document),
            _ => Self::from_yaml(&document),
        }
    }

    /// Number of namespaces in this subtree, this node included.
    pub fn namespace_count(&self) -> usize {
        1 + self.children.iter().map(NamespaceNode::namespace_count).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Names must be single path segments, `.` and `..` excluded.
    fn validate(&self) -> Result<(), ProvisionError> {
        naming::validate_segment(&self.name).map_err(|_| {
            ProvisionError::ConfigError(format!(
                "namespace name {:?} is not a single path segment",
                self.name
            ))
        })?;
        self.children.iter().try_for_each(NamespaceNode::validate)
    }
}

/// A namespace hierarchy ready to be provisioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTree {
    pub root: NamespaceNode,
    /// Tag prefixes allowed on every namespace created from this tree
    pub tag_prefixes: Vec<String>,
}

impl NamespaceTree {
    pub fn new(root: NamespaceNode, tag_prefixes: Vec<String>) -> Self {
        Self { root, tag_prefixes }
    }

    /// Builds the flat hierarchy holding the capacity namespaces of a run: a
    /// root named `base` and `num_children` children named `<base>-<i>`, each
    /// tagged with its index.
    pub fn flat(base: &str, num_children: usize) -> Self {
        let children = (0..num_children)
            .map(|i| {
                NamespaceNode::new(naming::child_name(base, i))
                    .with_tags([format!("child={i}"), CREATOR_TAG.to_string()])
            })
            .collect();
        let root = NamespaceNode::new(base).with_tags([CREATOR_TAG]).with_children(children);
        Self::new(root, Vec::new())
    }

    /// Namespaces of the tree in creation (pre-order) order, as full paths
    /// under `base_path`.
    pub fn paths(&self, base_path: &str) -> Vec<String> {
        let mut paths = Vec::with_capacity(self.root.namespace_count());
        let mut stack = vec![(base_path.to_string(), &self.root)];
        while let Some((base, node)) = stack.pop() {
            let path = naming::join(&base, &node.name);
            for child in node.children.iter().rev() {
                stack.push((path.clone(), child));
            }
            paths.push(path);
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_tree_flat_fan_out() {
        let tree = NamespaceTree::flat("sim", 3);
        assert_eq!(tree.root.name, "sim");
        assert_eq!(tree.root.tags, vec![CREATOR_TAG.to_string()]);
        assert!(tree.tag_prefixes.is_empty());

        let names: Vec<_> = tree.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["sim-0", "sim-1", "sim-2"]);
        for (i, child) in tree.root.children.iter().enumerate() {
            assert!(child.tags.contains(&format!("child={i}")));
            assert!(child.tags.contains(&CREATOR_TAG.to_string()));
            assert!(child.is_leaf());
        }
        assert_eq!(tree.root.namespace_count(), 4);
    }

    #[test]
    fn unit_tree_flat_without_children() {
        let tree = NamespaceTree::flat("sim", 0);
        assert!(tree.root.is_leaf());
        assert_eq!(tree.paths("/perf"), ["/perf/sim"]);
    }

    #[test]
    fn unit_tree_from_yaml() {
        let node = NamespaceNode::from_yaml(
            r#"
name: root
tags: ["level=0", "foo=bar"]
children:
  - name: c1
    tags: []
    children:
      - name: g1
        children: null
  - name: c2
    tags:
      - "level=1"
    children: []
"#,
        )
        .unwrap();

        assert_eq!(
            node,
            NamespaceNode::new("root").with_tags(["level=0", "foo=bar"]).with_children(vec![
                NamespaceNode::new("c1").with_children(vec![NamespaceNode::new("g1")]),
                NamespaceNode::new("c2").with_tags(["level=1"]),
            ])
        );
        assert_eq!(node.namespace_count(), 4);
    }

    #[test]
    fn unit_tree_from_json() {
        let node =
            NamespaceNode::from_json(r#"{"name": "a", "children": [{"name": "b", "tags": null}]}"#)
                .unwrap();
        assert_eq!(node, NamespaceNode::new("a").with_children(vec![NamespaceNode::new("b")]));
    }

    #[test]
    fn unit_tree_rejects_malformed_documents() {
        assert!(matches!(
            NamespaceNode::from_yaml("tags: [a]"),
            Err(ProvisionError::ConfigError(_))
        ));
        assert!(matches!(
            NamespaceNode::from_yaml("name: a/b"),
            Err(ProvisionError::ConfigError(_))
        ));
        assert!(matches!(
            NamespaceNode::from_json(r#"{"name": "a", "children": [{"name": ""}]}"#),
            Err(ProvisionError::ConfigError(_))
        ));
    }

    #[test]
    fn unit_tree_rejects_relative_segments() {
        for name in [".", ".."] {
            assert!(matches!(
                NamespaceNode::from_yaml(&format!("name: \"{name}\"")),
                Err(ProvisionError::ConfigError(_))
            ));
            assert!(matches!(
                NamespaceNode::from_yaml(&format!("name: a\nchildren:\n  - name: \"{name}\"")),
                Err(ProvisionError::ConfigError(_))
            ));
        }
    }

    #[test]
    fn unit_tree_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("tree.yaml");
        std::fs::write(&yaml, "name: perf\nchildren:\n  - name: a\n").unwrap();
        let json = dir.path().join("tree.json");
        std::fs::write(&json, r#"{"name": "perf", "tags": ["x=y"]}"#).unwrap();

        assert_eq!(NamespaceNode::from_file(&yaml).unwrap().namespace_count(), 2);
        assert_eq!(NamespaceNode::from_file(&json).unwrap().tags, ["x=y"]);
        assert!(matches!(
            NamespaceNode::from_file(dir.path().join("missing.yaml")),
            Err(ProvisionError::ConfigError(_))
        ));
    }

    #[test]
    fn unit_tree_paths_pre_order() {
        let tree = NamespaceTree::new(
            NamespaceNode::new("r").with_children(vec![
                NamespaceNode::new("a").with_children(vec![NamespaceNode::new("x")]),
                NamespaceNode::new("b"),
            ]),
            Vec::new(),
        );
        assert_eq!(tree.paths("/"), ["/r", "/r/a", "/r/a/x", "/r/b"]);
    }
}
