//! Administrative hierarchy: tree model, builder and destination reconciliation

pub mod builder;
pub mod reconciler;
pub mod tree;

pub use builder::{DEFAULT_CHILD_KEYS, TreeBuilder};
pub use reconciler::{HierarchyReconciler, NodeFailure, ReconcileReport};
pub use tree::{HierarchyNode, HierarchyTree, NodeId, Visit};
