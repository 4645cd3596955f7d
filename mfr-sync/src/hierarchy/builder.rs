//! Builds a [`HierarchyTree`] from the registry's nested hierarchy document
//!
//! The document is either a single root object or a one-element array of
//! them. Each node has an `id`, a `name` and its sub-nodes under `sub`
//! (`children` is accepted too, other keys can be configured). Depth is
//! unbounded; the build uses an explicit work queue instead of recursion.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};

use super::tree::{HierarchyNode, HierarchyTree, NodeId};
use crate::api::registry::models::value_to_id;
use crate::error::{SyncError, SyncResult};

pub const DEFAULT_CHILD_KEYS: [&str; 2] = ["sub", "children"];

#[derive(Debug, Clone)]
pub struct TreeBuilder {
    /// Keys holding a node's sub-nodes, tried in order
    child_keys: Vec<String>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self {
            child_keys: DEFAULT_CHILD_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.child_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(&self, document: &Value) -> SyncResult<HierarchyTree> {
        let root = root_of(document)?;

        let mut nodes: Vec<HierarchyNode> = Vec::new();
        let mut parents: Vec<Option<NodeId>> = Vec::new();
        let mut index: HashMap<String, NodeId> = HashMap::new();
        let mut queue: VecDeque<(&Value, Option<NodeId>, String)> = VecDeque::new();
        queue.push_back((root, None, "root".to_string()));

        while let Some((raw, parent, path)) = queue.pop_front() {
            let obj = raw.as_object().ok_or_else(|| {
                SyncError::MalformedHierarchy(format!("node at {} is not an object", path))
            })?;
            let id = obj.get("id").and_then(value_to_id).ok_or_else(|| {
                SyncError::MalformedHierarchy(format!("node at {} has no identifier", path))
            })?;
            if index.contains_key(&id) {
                return Err(SyncError::MalformedHierarchy(format!(
                    "duplicate node identifier '{}' at {}",
                    id, path
                )));
            }
            let name = obj
                .get("name")
                .and_then(Value::as_str)
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| id.clone());

            let node_id = NodeId(nodes.len());
            if let Some(parent) = parent {
                nodes[parent.0].children.push(node_id);
            }
            index.insert(id.clone(), node_id);
            parents.push(parent);

            for (i, child) in self.children_of(obj)?.iter().enumerate() {
                queue.push_back((child, Some(node_id), format!("{}/{}[{}]", path, id, i)));
            }

            nodes.push(HierarchyNode {
                id,
                name,
                children: Vec::new(),
            });
        }

        Ok(HierarchyTree {
            nodes,
            parents,
            index,
        })
    }

    fn children_of<'v>(&self, obj: &'v serde_json::Map<String, Value>) -> SyncResult<&'v [Value]> {
        for key in &self.child_keys {
            match obj.get(key) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(items)) => return Ok(items),
                Some(_) => {
                    return Err(SyncError::MalformedHierarchy(format!(
                        "'{}' of a node must be a list",
                        key
                    )));
                }
            }
        }
        Ok(&[])
    }
}

fn root_of(document: &Value) -> SyncResult<&Value> {
    match document {
        Value::Array(items) => match items.len() {
            0 => Err(SyncError::MalformedHierarchy("hierarchy has no root".into())),
            1 => Ok(&items[0]),
            n => Err(SyncError::MalformedHierarchy(format!(
                "hierarchy has {} top-level nodes, expected exactly one root",
                n
            ))),
        },
        Value::Object(_) => Ok(document),
        _ => Err(SyncError::MalformedHierarchy("hierarchy has no root".into())),
    }
}
