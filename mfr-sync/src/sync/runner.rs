//! Run orchestration
//!
//! A run selects the configured collection, rebuilds the hierarchy tree from
//! its hierarchy field, reconciles the tree into the destination and then
//! drives the requested facility streams. Every step is recorded in the
//! report's orchestration log, which is handed back with the error when a
//! step fails.

use log::info;

use super::cursor::{CursorStore, StreamKind};
use super::engine::{EngineOptions, FacilitySyncEngine};
use super::projection::UnitDefaults;
use super::report::{PassReport, RunFailure, SyncReport};
use crate::api::destination::OrgUnitStore;
use crate::api::registry::{
    Collection, FacilityRecord, PropertyKeys, SourceRegistry, find_hierarchy,
};
use crate::error::{SyncError, SyncResult};
use crate::hierarchy::{DEFAULT_CHILD_KEYS, HierarchyReconciler, HierarchyTree, TreeBuilder};
use crate::services::DestinationResolver;

/// Everything a run needs to know about the source collection
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Registry collection holding the facilities, matched by name
    pub collection_name: String,
    /// Code of the layer field whose config carries the hierarchy document
    pub hierarchy_field: String,
    /// Keys under which hierarchy nodes list their sub-nodes
    pub hierarchy_child_keys: Vec<String>,
    pub property_keys: PropertyKeys,
    pub defaults: UnitDefaults,
    /// Cursor value for a stream that never completed
    pub initial_cursor: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            collection_name: "Ethiopia Master Facility Registry".into(),
            hierarchy_field: "Admin_health_hierarchy".into(),
            hierarchy_child_keys: DEFAULT_CHILD_KEYS.iter().map(|k| k.to_string()).collect(),
            property_keys: PropertyKeys::default(),
            defaults: UnitDefaults::default(),
            initial_cursor: "1970-01-01T00:00:00Z".into(),
        }
    }
}

pub struct SyncRunner<'a> {
    registry: &'a dyn SourceRegistry,
    store: &'a dyn OrgUnitStore,
    cursors: &'a dyn CursorStore,
    settings: RunSettings,
}

impl<'a> SyncRunner<'a> {
    pub fn new(
        registry: &'a dyn SourceRegistry,
        store: &'a dyn OrgUnitStore,
        cursors: &'a dyn CursorStore,
        settings: RunSettings,
    ) -> Self {
        Self {
            registry,
            store,
            cursors,
            settings,
        }
    }

    /// Reconcile the hierarchy, then sync one stream
    pub async fn run(&self, stream: StreamKind) -> Result<SyncReport, RunFailure> {
        self.run_streams(&[stream]).await
    }

    /// Reconcile the hierarchy, then sync the Added and Updated streams in turn
    pub async fn run_all(&self) -> Result<SyncReport, RunFailure> {
        self.run_streams(&StreamKind::all()).await
    }

    /// Reconcile the hierarchy without touching any facility
    pub async fn reconcile_only(&self) -> Result<SyncReport, RunFailure> {
        self.run_streams(&[]).await
    }

    /// Place a single site with Added semantics. Cursors are left alone.
    pub async fn sync_site(&self, site_id: &str) -> Result<SyncReport, RunFailure> {
        let mut report = SyncReport::new();
        let result = self.sync_site_inner(site_id, &mut report).await;
        conclude(report, result)
    }

    async fn sync_site_inner(&self, site_id: &str, report: &mut SyncReport) -> SyncResult<()> {
        let (collection, tree) = self.prepare(report).await?;

        let site = self.registry.site(site_id).await?;
        let record = FacilityRecord::from_site(&site, &self.settings.property_keys);
        report.record(
            "fetch_site",
            format!("site {} ({}) -> {}", site_id, record.name, record.admin_hierarchy_code),
        );

        let engine = FacilitySyncEngine::new(
            self.registry,
            self.cursors,
            &tree,
            self.engine_options(&collection),
        );
        let mut resolver = DestinationResolver::new(self.store);
        let mut pass = PassReport::new(StreamKind::Added);
        let outcome = engine
            .sync_records(std::slice::from_ref(&record), &mut resolver, &mut pass)
            .await;
        report.record(
            "sync_site",
            format!("{} submitted, {} imported", pass.submitted, pass.imported),
        );
        report.passes.push(pass);
        outcome
    }

    async fn run_streams(&self, streams: &[StreamKind]) -> Result<SyncReport, RunFailure> {
        let mut report = SyncReport::new();
        let result = self.run_inner(streams, &mut report).await;
        conclude(report, result)
    }

    async fn run_inner(&self, streams: &[StreamKind], report: &mut SyncReport) -> SyncResult<()> {
        let (collection, tree) = self.prepare(report).await?;
        let mut resolver = DestinationResolver::new(self.store);

        let reconciled = HierarchyReconciler::new(&tree, self.settings.defaults.clone())
            .reconcile(&mut resolver)
            .await;
        report.record(
            "reconcile_hierarchy",
            format!(
                "{} nodes, {} created, {} gaps, {} failures",
                reconciled.visited,
                reconciled.created.len(),
                reconciled.gaps.len(),
                reconciled.failures.len()
            ),
        );
        report.reconcile = Some(reconciled);

        let engine = FacilitySyncEngine::new(
            self.registry,
            self.cursors,
            &tree,
            self.engine_options(&collection),
        );
        for &stream in streams {
            let mut pass = PassReport::new(stream);
            let outcome = engine.run_pass(stream, &mut resolver, &mut pass).await;
            report.record(
                format!("{}_pass", stream.label()),
                format!(
                    "{} pages, {} records, {} imported, {} issues",
                    pass.pages,
                    pass.records,
                    pass.imported,
                    pass.issues.len()
                ),
            );
            report.passes.push(pass);
            outcome?;
        }

        let stats = resolver.stats();
        info!(
            "Destination traffic: {} lookups, {} memo hits, {} creates, {} imports",
            stats.lookups, stats.memo_hits, stats.creates, stats.imports
        );
        Ok(())
    }

    /// Select the collection and build its hierarchy tree
    async fn prepare(&self, report: &mut SyncReport) -> SyncResult<(Collection, HierarchyTree)> {
        let collection = self.select_collection().await?;
        report.collection = Some(collection.name.clone());
        report.record(
            "select_collection",
            format!("{} ({})", collection.name, collection.id),
        );

        let tree = self.load_tree(&collection.id.0).await?;
        report.record(
            "build_hierarchy",
            format!("{} nodes, depth {}", tree.len(), tree.depth()),
        );
        Ok((collection, tree))
    }

    /// The configured collection, matched by name ignoring case
    pub async fn select_collection(&self) -> SyncResult<Collection> {
        let wanted = self.settings.collection_name.trim();
        self.registry
            .collections()
            .await?
            .into_iter()
            .find(|c| c.name.trim().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SyncError::NotFound {
                code: wanted.to_string(),
                context: "registry collection".into(),
            })
    }

    /// Hierarchy tree from the collection's hierarchy field
    pub async fn load_tree(&self, collection_id: &str) -> SyncResult<HierarchyTree> {
        let layers = self.registry.layers(collection_id).await?;
        let document = find_hierarchy(&layers, &self.settings.hierarchy_field).ok_or_else(|| {
            SyncError::MalformedHierarchy(format!(
                "collection {} has no hierarchy field '{}'",
                collection_id, self.settings.hierarchy_field
            ))
        })?;
        TreeBuilder::new()
            .with_child_keys(self.settings.hierarchy_child_keys.iter().cloned())
            .build(document)
    }

    fn engine_options(&self, collection: &Collection) -> EngineOptions {
        EngineOptions {
            collection_id: collection.id.0.clone(),
            property_keys: self.settings.property_keys.clone(),
            defaults: self.settings.defaults.clone(),
            initial_cursor: self.settings.initial_cursor.clone(),
        }
    }
}

fn conclude(mut report: SyncReport, result: SyncResult<()>) -> Result<SyncReport, RunFailure> {
    report.finish();
    match result {
        Ok(()) => Ok(report),
        Err(error) => {
            report.record("failed", format!("{}: {}", error.kind(), error));
            Err(RunFailure { error, report })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::registry::FlexibleId;
    use crate::sync::cursor::MemoryCursorStore;
    use crate::testing::{MemoryOrgUnitStore, MemoryRegistry, site};
    use serde_json::{Value, json};

    fn collections() -> Vec<Collection> {
        vec![
            Collection {
                id: FlexibleId("3".into()),
                name: "Test Collection".into(),
            },
            Collection {
                id: FlexibleId("7".into()),
                name: "Ethiopia Master Facility Registry".into(),
            },
        ]
    }

    fn layers() -> Value {
        json!([{"name": "Administrative", "fields": [
            {"code": "phone_number", "kind": "phone"},
            {"code": "Admin_health_hierarchy", "kind": "hierarchy", "config": {"hierarchy": [
                {"id": "1", "name": "Ethiopia", "sub": [
                    {"id": "10", "name": "Tigray Regional Health Bureau", "sub": [
                        {"id": "100", "name": "Mekelle Zonal Health Department"}
                    ]}
                ]}
            ]}}
        ]}])
    }

    fn facility(id: u32) -> Value {
        site(id, &format!("Facility {} Health Center", id), json!({
            "Admin_health_hierarchy": "100",
            "ethiopian_national_id": format!("ET-{}", id)
        }))
    }

    #[tokio::test]
    async fn test_run_all_reconciles_then_runs_both_streams() {
        let registry = MemoryRegistry::with_pages(vec![vec![facility(1)]])
            .with_collections(collections())
            .with_layers(layers());
        let store = MemoryOrgUnitStore::new();
        let cursors = MemoryCursorStore::new();
        let runner = SyncRunner::new(&registry, &store, &cursors, RunSettings::default());

        let report = runner.run_all().await.unwrap();

        assert_eq!(report.collection.as_deref(), Some("Ethiopia Master Facility Registry"));
        assert_eq!(report.reconcile.as_ref().unwrap().created.len(), 3);
        assert_eq!(report.passes.len(), 2);
        assert!(report.pass(StreamKind::Added).unwrap().is_complete());
        assert!(report.pass(StreamKind::Updated).unwrap().is_complete());
        let steps: Vec<_> = report.orchestrations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            steps,
            vec![
                "select_collection",
                "build_hierarchy",
                "reconcile_hierarchy",
                "added_pass",
                "updated_pass"
            ]
        );
        assert!(report.finished_at.is_some());
        assert!(store.contains_code("ET-1"));
        // The hierarchy was reconciled up front, facilities created none of it
        assert!(report.pass(StreamKind::Added).unwrap().ancestors_created.is_empty());
    }

    #[tokio::test]
    async fn test_failure_carries_partial_log() {
        let registry = MemoryRegistry::with_pages(vec![vec![facility(1)], vec![facility(2)]])
            .with_collections(collections())
            .with_layers(layers());
        registry.fail_page(1);
        let store = MemoryOrgUnitStore::new();
        let cursors = MemoryCursorStore::new();
        let runner = SyncRunner::new(&registry, &store, &cursors, RunSettings::default());

        let failure = runner.run(StreamKind::Added).await.unwrap_err();

        assert_eq!(failure.error.kind(), "SourceFetchError");
        let last = failure.report.orchestrations.last().unwrap();
        assert_eq!(last.name, "failed");
        assert_eq!(failure.report.passes[0].pages, 1);
        assert!(cursors.get(StreamKind::Added).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_tree_with_configured_child_keys() {
        let registry = MemoryRegistry::with_pages(vec![]).with_layers(json!([{"name": "Administrative", "fields": [
            {"code": "Admin_health_hierarchy", "kind": "hierarchy", "config": {"hierarchy": [
                {"id": "1", "name": "Ethiopia", "items": [
                    {"id": "10", "name": "Tigray Regional Health Bureau", "items": [
                        {"id": "100", "name": "Mekelle Zonal Health Department"}
                    ]}
                ]}
            ]}}
        ]}]));
        let store = MemoryOrgUnitStore::new();
        let cursors = MemoryCursorStore::new();
        let settings = RunSettings {
            hierarchy_child_keys: vec!["items".into()],
            ..RunSettings::default()
        };
        let runner = SyncRunner::new(&registry, &store, &cursors, settings);

        let tree = runner.load_tree("7").await.unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.depth(), 3);
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let registry = MemoryRegistry::with_pages(vec![]).with_collections(collections());
        let store = MemoryOrgUnitStore::new();
        let cursors = MemoryCursorStore::new();
        let settings = RunSettings {
            collection_name: "Somewhere Else".into(),
            ..RunSettings::default()
        };
        let runner = SyncRunner::new(&registry, &store, &cursors, settings);

        let failure = runner.reconcile_only().await.unwrap_err();
        assert_eq!(failure.error.kind(), "NotFound");
        assert!(failure.report.orchestrations.iter().all(|o| o.name != "select_collection"));
    }

    #[tokio::test]
    async fn test_missing_hierarchy_field() {
        let registry = MemoryRegistry::with_pages(vec![])
            .with_collections(collections())
            .with_layers(json!([{"name": "Empty", "fields": []}]));
        let store = MemoryOrgUnitStore::new();
        let cursors = MemoryCursorStore::new();
        let runner = SyncRunner::new(&registry, &store, &cursors, RunSettings::default());

        let failure = runner.reconcile_only().await.unwrap_err();
        assert!(matches!(failure.error, SyncError::MalformedHierarchy(_)));
    }

    #[tokio::test]
    async fn test_sync_site_leaves_cursors() {
        let registry = MemoryRegistry::with_pages(vec![vec![facility(5)]])
            .with_collections(collections())
            .with_layers(layers());
        let store = MemoryOrgUnitStore::new();
        let cursors = MemoryCursorStore::new();
        let runner = SyncRunner::new(&registry, &store, &cursors, RunSettings::default());

        let report = runner.sync_site("5").await.unwrap();

        assert!(store.contains_code("ET-5"));
        assert_eq!(report.passes[0].imported, 1);
        assert!(registry.requests().is_empty());
        for kind in StreamKind::all() {
            assert!(cursors.get(kind).await.unwrap().is_none());
        }
    }
}
