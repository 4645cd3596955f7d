//! Breadth-first reconciliation of the hierarchy into the destination
//!
//! Every node is ensured to exist as an org unit with `code = node.id`.
//! BFS order guarantees a node's parent is visited on an earlier level, so a
//! parent's destination id is known (or known to be missing) by the time its
//! children are processed.

use log::{debug, info, warn};

use super::tree::HierarchyTree;
use crate::error::SyncError;
use crate::services::DestinationResolver;
use crate::sync::projection::{UnitDefaults, hierarchy_unit};

/// A node whose reconciliation failed; the walk carried on without it
#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub code: String,
    pub error: SyncError,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub visited: usize,
    pub existing: usize,
    /// Codes created during this walk
    pub created: Vec<String>,
    /// `ReconciliationGap` warnings
    pub gaps: Vec<SyncError>,
    pub failures: Vec<NodeFailure>,
    /// Codes in the order they were visited
    pub visit_order: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.gaps.is_empty() && self.failures.is_empty()
    }
}

pub struct HierarchyReconciler<'t> {
    tree: &'t HierarchyTree,
    defaults: UnitDefaults,
}

impl<'t> HierarchyReconciler<'t> {
    pub fn new(tree: &'t HierarchyTree, defaults: UnitDefaults) -> Self {
        Self { tree, defaults }
    }

    /// Walk the whole tree once. Per-node errors are recorded, never raised.
    pub async fn reconcile(&self, resolver: &mut DestinationResolver<'_>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for visit in self.tree.bfs() {
            let node = self.tree.node(visit.node);
            report.visited += 1;
            report.visit_order.push(node.id.clone());

            match resolver.find_id_by_code(&node.id).await {
                Ok(Some(_)) => {
                    report.existing += 1;
                    continue;
                }
                Ok(None) => {}
                Err(error) => {
                    warn!("Lookup of hierarchy node '{}' failed: {}", node.id, error);
                    report.failures.push(NodeFailure {
                        code: node.id.clone(),
                        error,
                    });
                    continue;
                }
            }

            let parent_id = match visit.parent {
                None => None,
                Some(parent) => {
                    let parent_code = &self.tree.node(parent).id;
                    match resolver.find_id_by_code(parent_code).await {
                        Ok(Some(id)) => Some(id),
                        Ok(None) => {
                            let gap = SyncError::ReconciliationGap {
                                code: node.id.clone(),
                                parent_code: parent_code.clone(),
                            };
                            warn!("{}", gap);
                            report.gaps.push(gap);
                            continue;
                        }
                        Err(error) => {
                            warn!("Lookup of parent '{}' failed: {}", parent_code, error);
                            report.failures.push(NodeFailure {
                                code: node.id.clone(),
                                error,
                            });
                            continue;
                        }
                    }
                }
            };

            let unit = hierarchy_unit(self.tree, visit.node, parent_id, &self.defaults);
            match resolver.create(&unit).await {
                Ok(id) => {
                    debug!("Reconciled '{}' ({}) as {}", unit.name, unit.code, id);
                    report.created.push(node.id.clone());
                }
                Err(error) => {
                    warn!("Creating hierarchy node '{}' failed: {}", node.id, error);
                    report.failures.push(NodeFailure {
                        code: node.id.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "Hierarchy reconciled: {} visited, {} existing, {} created, {} gaps, {} failures",
            report.visited,
            report.existing,
            report.created.len(),
            report.gaps.len(),
            report.failures.len()
        );
        report
    }
}
