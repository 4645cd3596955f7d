//! In-memory fakes of the source registry and the destination

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::api::destination::{
    ImportRejection, ImportStrategy, ImportSummary, OrgUnit, OrgUnitStore,
};
use crate::api::registry::{Collection, Layer, PageCursor, RawSite, SitePage, SourceRegistry};
use crate::error::{SyncError, SyncResult};

/// Site JSON as the registry returns it
pub fn site(id: u32, name: &str, properties: Value) -> Value {
    json!({
        "id": id,
        "name": name,
        "lat": 11.6,
        "long": 37.4,
        "properties": properties
    })
}

#[derive(Default)]
struct StoreState {
    units: Vec<OrgUnit>,
    next_id: usize,
    code_lookups: usize,
    created: Vec<OrgUnit>,
    imports: Vec<(Vec<OrgUnit>, ImportStrategy)>,
    reject_creates: HashSet<String>,
    commit_then_reject: HashSet<String>,
    transient_lookups: bool,
}

impl StoreState {
    fn assign_id(&mut self) -> String {
        self.next_id += 1;
        format!("ou{:09}", self.next_id)
    }
}

/// Destination fake that stores org units in a vector
#[derive(Default)]
pub struct MemoryOrgUnitStore {
    state: Mutex<StoreState>,
}

impl MemoryOrgUnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an existing unit, returning its id
    pub fn seed(&self, mut unit: OrgUnit) -> String {
        let mut state = self.state.lock().unwrap();
        let id = match &unit.id {
            Some(id) => id.clone(),
            None => state.assign_id(),
        };
        unit.id = Some(id.clone());
        state.units.push(unit);
        id
    }

    /// Make single creates of `code` fail with a permanent rejection
    pub fn fail_create_for(&self, code: &str) {
        self.state.lock().unwrap().reject_creates.insert(code.to_string());
    }

    /// Make single creates of `code` store the unit and still answer with a
    /// conflict, as a retried create does once its first attempt committed
    pub fn commit_then_reject_create_for(&self, code: &str) {
        self.state.lock().unwrap().commit_then_reject.insert(code.to_string());
    }

    /// Make every lookup fail with a transient error
    pub fn fail_lookups(&self) {
        self.state.lock().unwrap().transient_lookups = true;
    }

    pub fn code_lookups(&self) -> usize {
        self.state.lock().unwrap().code_lookups
    }

    pub fn create_count(&self) -> usize {
        self.state.lock().unwrap().created.len()
    }

    /// Units created through single creates, in order, with their ids
    pub fn created_units(&self) -> Vec<OrgUnit> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn imports(&self) -> Vec<(Vec<OrgUnit>, ImportStrategy)> {
        self.state.lock().unwrap().imports.clone()
    }

    pub fn codes(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.units.iter().map(|u| u.code.clone()).collect()
    }

    pub fn unit_for_code(&self, code: &str) -> Option<OrgUnit> {
        let state = self.state.lock().unwrap();
        state.units.iter().find(|u| u.code == code).cloned()
    }

    pub fn id_for_code(&self, code: &str) -> Option<String> {
        self.unit_for_code(code).and_then(|u| u.id)
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.unit_for_code(code).is_some()
    }
}

#[async_trait]
impl OrgUnitStore for MemoryOrgUnitStore {
    async fn find_by_code(&self, code: &str) -> SyncResult<Option<OrgUnit>> {
        let mut state = self.state.lock().unwrap();
        state.code_lookups += 1;
        if state.transient_lookups {
            return Err(SyncError::DestinationFetch {
                message: "503 Service Unavailable".into(),
                status: Some(503),
                transient: true,
            });
        }
        Ok(state.units.iter().find(|u| u.code == code).cloned())
    }

    async fn find_by_name(&self, name: &str, parent_id: Option<&str>) -> SyncResult<Option<OrgUnit>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .units
            .iter()
            .find(|u| u.name == name && (parent_id.is_none() || u.parent_id.as_deref() == parent_id))
            .cloned())
    }

    async fn create(&self, unit: &OrgUnit) -> SyncResult<String> {
        let mut state = self.state.lock().unwrap();
        if state.reject_creates.contains(&unit.code) {
            return Err(SyncError::DestinationWrite {
                message: format!("409 Conflict creating {}", unit.code),
                status: Some(409),
                transient: false,
            });
        }
        let id = state.assign_id();
        let stored = unit.clone().with_id(id.clone());
        state.units.push(stored.clone());
        state.created.push(stored);
        if state.commit_then_reject.contains(&unit.code) {
            return Err(SyncError::DestinationWrite {
                message: format!("409 Conflict: code {} already exists", unit.code),
                status: Some(409),
                transient: false,
            });
        }
        Ok(id)
    }

    async fn import(&self, units: &[OrgUnit], strategy: ImportStrategy) -> SyncResult<ImportSummary> {
        let mut state = self.state.lock().unwrap();
        state.imports.push((units.to_vec(), strategy));
        let mut summary = ImportSummary::default();

        for unit in units {
            let existing = state.units.iter().position(|u| match (&unit.id, strategy) {
                (Some(id), ImportStrategy::Update) => u.id.as_ref() == Some(id),
                _ => u.code == unit.code,
            });
            match (existing, strategy) {
                (Some(pos), _) => {
                    let id = state.units[pos].id.clone().unwrap_or_default();
                    state.units[pos] = unit.clone().with_id(id.clone());
                    summary.updated += 1;
                    summary.imported.insert(unit.code.clone(), id);
                }
                (None, ImportStrategy::CreateAndUpdate) => {
                    let id = state.assign_id();
                    state.units.push(unit.clone().with_id(id.clone()));
                    summary.created += 1;
                    summary.imported.insert(unit.code.clone(), id);
                }
                (None, ImportStrategy::Update) => {
                    summary.ignored += 1;
                    summary.rejections.push(ImportRejection {
                        code: Some(unit.code.clone()),
                        reason: "Object does not exist".into(),
                    });
                }
            }
        }
        Ok(summary)
    }
}

#[derive(Default)]
struct RegistryState {
    pages: Vec<Value>,
    failing_page: Option<usize>,
    requests: Vec<PageCursor>,
    collections: Vec<Collection>,
    layers: Vec<Layer>,
}

/// Source fake serving pre-built pages linked by `page:N` next URLs
#[derive(Default)]
pub struct MemoryRegistry {
    state: Mutex<RegistryState>,
}

impl MemoryRegistry {
    /// Pages of site JSON, chained in order
    pub fn with_pages(pages: Vec<Vec<Value>>) -> Self {
        let count = pages.len();
        let raw = pages
            .into_iter()
            .enumerate()
            .map(|(i, sites)| {
                let next = if i + 1 < count {
                    json!(format!("page:{}", i + 1))
                } else {
                    Value::Null
                };
                json!({ "sites": sites, "nextPage": next })
            })
            .collect();
        Self::with_raw_pages(raw)
    }

    /// Pages given as full response bodies
    pub fn with_raw_pages(pages: Vec<Value>) -> Self {
        let registry = Self::default();
        registry.state.lock().unwrap().pages = pages;
        registry
    }

    pub fn with_collections(self, collections: Vec<Collection>) -> Self {
        self.state.lock().unwrap().collections = collections;
        self
    }

    pub fn with_layers(self, layers: Value) -> Self {
        self.state.lock().unwrap().layers = serde_json::from_value(layers).unwrap();
        self
    }

    /// Make the page at `index` fail with a transport error
    pub fn fail_page(&self, index: usize) {
        self.state.lock().unwrap().failing_page = Some(index);
    }

    pub fn requests(&self) -> Vec<PageCursor> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl SourceRegistry for MemoryRegistry {
    async fn collections(&self) -> SyncResult<Vec<Collection>> {
        Ok(self.state.lock().unwrap().collections.clone())
    }

    async fn layers(&self, _collection_id: &str) -> SyncResult<Vec<Layer>> {
        Ok(self.state.lock().unwrap().layers.clone())
    }

    async fn fetch_page(&self, cursor: &PageCursor) -> SyncResult<SitePage> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(cursor.clone());
        let index = match cursor {
            PageCursor::First { .. } => 0,
            PageCursor::Next(url) => url
                .strip_prefix("page:")
                .and_then(|n| n.parse().ok())
                .unwrap_or(usize::MAX),
        };
        if state.failing_page == Some(index) {
            return Err(SyncError::SourceFetch {
                message: "connection reset".into(),
                status: None,
                transient: true,
            });
        }
        let page = state
            .pages
            .get(index)
            .cloned()
            .ok_or_else(|| SyncError::source_fetch(format!("no page {}", index)))?;
        Ok(serde_json::from_value(page).unwrap())
    }

    async fn site(&self, site_id: &str) -> SyncResult<RawSite> {
        let state = self.state.lock().unwrap();
        state
            .pages
            .iter()
            .filter_map(|page| page.get("sites").and_then(Value::as_array))
            .flatten()
            .filter_map(|s| serde_json::from_value::<RawSite>(s.clone()).ok())
            .find(|s| s.id.0 == site_id)
            .ok_or_else(|| SyncError::SourceFetch {
                message: format!("404 Not Found: site {}", site_id),
                status: Some(404),
                transient: false,
            })
    }
}
