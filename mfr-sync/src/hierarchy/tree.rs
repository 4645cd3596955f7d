//! In-memory administrative hierarchy
//!
//! Nodes live in an arena and refer to their children by [`NodeId`]. Parent
//! links are kept in a side table owned by the tree, so a node only knows its
//! own id, name and ordered children.

use std::collections::{HashMap, VecDeque};

/// Index of a node inside its [`HierarchyTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub id: String,
    pub name: String,
    pub children: Vec<NodeId>,
}

/// Immutable tree built once per run by the tree builder
#[derive(Debug, Clone)]
pub struct HierarchyTree {
    pub(crate) nodes: Vec<HierarchyNode>,
    pub(crate) parents: Vec<Option<NodeId>>,
    pub(crate) index: HashMap<String, NodeId>,
}

impl HierarchyTree {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &HierarchyNode {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.0]
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by its stable identifier
    pub fn find(&self, code: &str) -> Option<NodeId> {
        self.index.get(code).copied()
    }

    /// Number of levels, a lone root has depth 1
    pub fn depth(&self) -> usize {
        self.bfs().map(|visit| visit.level + 1).max().unwrap_or(0)
    }

    /// Breadth-first traversal from the root
    pub fn bfs(&self) -> Bfs<'_> {
        let mut queue = VecDeque::new();
        if !self.nodes.is_empty() {
            queue.push_back((self.root(), 0));
        }
        Bfs { tree: self, queue }
    }

    /// Nodes from the root down to `id`, both inclusive
    pub fn ancestor_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }
}

/// One step of a breadth-first walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub node: NodeId,
    pub parent: Option<NodeId>,
    pub level: usize,
}

pub struct Bfs<'a> {
    tree: &'a HierarchyTree,
    queue: VecDeque<(NodeId, usize)>,
}

impl Iterator for Bfs<'_> {
    type Item = Visit;

    fn next(&mut self) -> Option<Visit> {
        let (node, level) = self.queue.pop_front()?;
        for child in &self.tree.node(node).children {
            self.queue.push_back((*child, level + 1));
        }
        Some(Visit {
            node,
            parent: self.tree.parent(node),
            level,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::hierarchy::TreeBuilder;
    use serde_json::json;

    fn sample() -> crate::hierarchy::HierarchyTree {
        TreeBuilder::new()
            .build(&json!([{
                "id": "1", "name": "Federal Ministry of Health",
                "sub": [
                    {"id": "2", "name": "Amhara Regional Health Bureau", "sub": [
                        {"id": "4", "name": "North Gondar Zonal Health Department"}
                    ]},
                    {"id": "3", "name": "Oromia Regional Health Bureau"}
                ]
            }]))
            .unwrap()
    }

    #[test]
    fn test_bfs_order_is_level_by_level() {
        let tree = sample();
        let order: Vec<_> = tree.bfs().map(|v| tree.node(v.node).id.clone()).collect();
        assert_eq!(order, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_ancestor_chain_root_first() {
        let tree = sample();
        let leaf = tree.find("4").unwrap();
        let chain: Vec<_> = tree
            .ancestor_chain(leaf)
            .into_iter()
            .map(|n| tree.node(n).id.as_str())
            .collect();
        assert_eq!(chain, vec!["1", "2", "4"]);
        assert_eq!(tree.ancestor_chain(tree.root()).len(), 1);
    }

    #[test]
    fn test_depth_and_parents() {
        let tree = sample();
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.len(), 4);
        assert!(tree.parent(tree.root()).is_none());
        let zone = tree.find("4").unwrap();
        assert_eq!(tree.parent(zone), tree.find("2"));
    }
}
