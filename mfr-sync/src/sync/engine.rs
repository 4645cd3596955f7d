//! Paginated facility sync
//!
//! The Added pass places every new facility under its administrative unit,
//! creating missing ancestors top-down, then bulk-imports the page. The
//! Updated pass only rewrites facilities that already exist. A cursor is
//! advanced only after every page of its stream succeeded; pages imported
//! before a failure are not rolled back and are re-sent on the next run.

use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashSet;

use super::cursor::{CursorStore, StreamKind, format_timestamp};
use super::phcu;
use super::projection::{UnitDefaults, facility_unit, hierarchy_unit};
use super::report::PassReport;
use crate::api::destination::{ImportStrategy, OrgUnit};
use crate::api::registry::{FacilityRecord, PageCursor, PropertyKeys, SourceRegistry};
use crate::error::{SyncError, SyncResult};
use crate::api::resilience::RetryableError;
use crate::hierarchy::{HierarchyTree, NodeId};
use crate::services::DestinationResolver;

/// Settings the engine needs besides its collaborators
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub collection_id: String,
    pub property_keys: PropertyKeys,
    pub defaults: UnitDefaults,
    /// Cursor used when a stream has never completed
    pub initial_cursor: String,
}

pub struct FacilitySyncEngine<'a> {
    registry: &'a dyn SourceRegistry,
    cursors: &'a dyn CursorStore,
    tree: &'a HierarchyTree,
    options: EngineOptions,
}

impl<'a> FacilitySyncEngine<'a> {
    pub fn new(
        registry: &'a dyn SourceRegistry,
        cursors: &'a dyn CursorStore,
        tree: &'a HierarchyTree,
        options: EngineOptions,
    ) -> Self {
        Self {
            registry,
            cursors,
            tree,
            options,
        }
    }

    /// Run one stream to completion. `report` holds partial progress when
    /// an error is returned.
    pub async fn run_pass(
        &self,
        stream: StreamKind,
        resolver: &mut DestinationResolver<'_>,
        report: &mut PassReport,
    ) -> SyncResult<()> {
        let since = self
            .cursors
            .get(stream)
            .await?
            .unwrap_or_else(|| self.options.initial_cursor.clone());
        report.since = since.clone();
        info!("Starting {} pass since {}", stream, since);

        let mut cursor = Some(PageCursor::first(
            self.options.collection_id.clone(),
            stream,
            since,
        ));
        let mut seen_urls: HashSet<String> = HashSet::new();

        while let Some(current) = cursor.take() {
            let page = self.registry.fetch_page(&current).await?;
            if let Some(error) = page.embedded_error() {
                return Err(SyncError::source_fetch(format!(
                    "registry reported an error on page {}: {}",
                    report.pages + 1,
                    error
                )));
            }
            report.pages += 1;

            let records: Vec<FacilityRecord> = page
                .sites
                .iter()
                .map(|site| FacilityRecord::from_site(site, &self.options.property_keys))
                .collect();
            debug!("Page {}: {} records", report.pages, records.len());

            match stream {
                StreamKind::Added => self.process_added_page(&records, resolver, report).await?,
                StreamKind::Updated => self.process_updated_page(&records, resolver, report).await?,
            }

            if let Some(next) = page.next_page() {
                if !seen_urls.insert(next.to_string()) {
                    return Err(SyncError::source_fetch(format!(
                        "registry returned an already visited next page: {}",
                        next
                    )));
                }
                cursor = Some(PageCursor::Next(next.to_string()));
            }
        }

        let now = format_timestamp(Utc::now());
        self.cursors.set(stream, &now).await?;
        report.cursor_advanced_to = Some(now);
        info!(
            "{} pass complete: {} pages, {} records, {} imported, {} issues",
            stream,
            report.pages,
            report.records,
            report.imported,
            report.issues.len()
        );
        Ok(())
    }

    /// Place and import a set of records with Added semantics, no cursor involved
    pub async fn sync_records(
        &self,
        records: &[FacilityRecord],
        resolver: &mut DestinationResolver<'_>,
        report: &mut PassReport,
    ) -> SyncResult<()> {
        self.process_added_page(records, resolver, report).await
    }

    async fn process_added_page(
        &self,
        records: &[FacilityRecord],
        resolver: &mut DestinationResolver<'_>,
        report: &mut PassReport,
    ) -> SyncResult<()> {
        let mut batch: Vec<OrgUnit> = Vec::new();

        for index in phcu::processing_order(records) {
            let record = &records[index];
            report.records += 1;

            let Some(node) = self.tree.find(&record.admin_hierarchy_code) else {
                let issue = SyncError::UnresolvedAncestor {
                    facility: record.name.clone(),
                    code: record.admin_hierarchy_code.clone(),
                    reason: "no such node in the hierarchy".into(),
                };
                warn!("{}", issue);
                report.issues.push(issue);
                continue;
            };
            let leaf_id = self.resolve_ancestors(record, node, resolver, report).await?;

            if record.is_phcu_parent() {
                self.register_phcu_parent(record, leaf_id, resolver, report).await?;
                continue;
            }

            let parent_id = if record.is_phcu_child() {
                if resolver
                    .find_id_by_code(&record.national_identifier)
                    .await?
                    .is_some()
                {
                    debug!("PHCU child '{}' already registered", record.national_identifier);
                    continue;
                }
                match self.resolve_phcu_parent(record, records, resolver, report).await? {
                    Some(id) => Some(id),
                    None => {
                        let issue = SyncError::UnresolvedAncestor {
                            facility: record.name.clone(),
                            code: record.parent_phcu_id.clone().unwrap_or_default(),
                            reason: "PHCU parent not found, placed under its administrative unit".into(),
                        };
                        warn!("{}", issue);
                        report.issues.push(issue);
                        leaf_id
                    }
                }
            } else {
                leaf_id
            };

            let unit = facility_unit(record, parent_id, &self.options.defaults);
            // A record repeated on a page is submitted once, last one wins
            batch.retain(|queued| queued.code != unit.code);
            batch.push(unit);
        }

        self.submit(batch, ImportStrategy::CreateAndUpdate, resolver, report).await
    }

    async fn process_updated_page(
        &self,
        records: &[FacilityRecord],
        resolver: &mut DestinationResolver<'_>,
        report: &mut PassReport,
    ) -> SyncResult<()> {
        let mut batch: Vec<OrgUnit> = Vec::new();

        for record in records {
            report.records += 1;

            let Some(admin_id) = resolver.find_id_by_code(&record.admin_hierarchy_code).await? else {
                report.issues.push(SyncError::NotFound {
                    code: record.admin_hierarchy_code.clone(),
                    context: format!("administrative unit of '{}'", record.name),
                });
                continue;
            };
            let Some(existing) = resolver
                .find_by_code(&record.national_identifier)
                .await?
                .filter(|unit| unit.id.is_some())
            else {
                report.issues.push(SyncError::NotFound {
                    code: record.national_identifier.clone(),
                    context: format!("facility '{}' to update", record.name),
                });
                continue;
            };

            // A PHCU child stays nested under its parent half
            let parent_id = if record.is_phcu_child() {
                let nested = match record.parent_phcu_id.as_deref() {
                    Some(parent_code) => resolver.find_id_by_code(parent_code).await?,
                    None => None,
                };
                nested.or(existing.parent_id).unwrap_or(admin_id)
            } else {
                admin_id
            };

            let existing_id = existing.id.unwrap_or_default();
            let unit = facility_unit(record, Some(parent_id), &self.options.defaults).with_id(existing_id);
            batch.retain(|queued| queued.code != unit.code);
            batch.push(unit);
        }

        self.submit(batch, ImportStrategy::Update, resolver, report).await
    }

    async fn submit(
        &self,
        batch: Vec<OrgUnit>,
        strategy: ImportStrategy,
        resolver: &mut DestinationResolver<'_>,
        report: &mut PassReport,
    ) -> SyncResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let summary = resolver.import(&batch, strategy).await?;
        for rejection in &summary.rejections {
            warn!(
                "Import rejected {}: {}",
                rejection.code.as_deref().unwrap_or("<unknown>"),
                rejection.reason
            );
        }
        report.absorb(batch.len(), summary);
        Ok(())
    }

    /// Ensure every ancestor of `leaf` exists, root first. Returns the leaf's
    /// destination id, or `None` when a create was rejected along the way.
    async fn resolve_ancestors(
        &self,
        record: &FacilityRecord,
        leaf: NodeId,
        resolver: &mut DestinationResolver<'_>,
        report: &mut PassReport,
    ) -> SyncResult<Option<String>> {
        let mut parent_id: Option<String> = None;

        for node in self.tree.ancestor_chain(leaf) {
            let code = &self.tree.node(node).id;
            if let Some(id) = resolver.find_id_by_code(code).await? {
                parent_id = Some(id);
                continue;
            }

            let unit = hierarchy_unit(self.tree, node, parent_id.take(), &self.options.defaults);
            match create_unit(&unit, resolver).await? {
                CreateOutcome::Created(id) => {
                    info!("Created missing ancestor '{}' ({})", unit.name, code);
                    report.ancestors_created.push(code.clone());
                    parent_id = Some(id);
                }
                CreateOutcome::Rejected(error) => {
                    let issue = SyncError::UnresolvedAncestor {
                        facility: record.name.clone(),
                        code: code.clone(),
                        reason: error.to_string(),
                    };
                    warn!("{}", issue);
                    report.issues.push(issue);
                    return Ok(None);
                }
            }
        }

        Ok(parent_id)
    }

    /// Find or create the parent half of a PHCU pair. Its code is its
    /// national identifier; an existing unit is matched by name only under
    /// a resolved administrative unit.
    async fn register_phcu_parent(
        &self,
        record: &FacilityRecord,
        leaf_id: Option<String>,
        resolver: &mut DestinationResolver<'_>,
        report: &mut PassReport,
    ) -> SyncResult<Option<String>> {
        let code = &record.national_identifier;
        if let Some(id) = resolver.cached(code) {
            return Ok(Some(id.to_string()));
        }
        if let Some(leaf) = leaf_id.as_deref() {
            if let Some(id) = resolver.find_id_by_name(&record.name, Some(leaf)).await? {
                resolver.remember(code.clone(), id.clone());
                return Ok(Some(id));
            }
        }
        if let Some(id) = resolver.find_id_by_code(code).await? {
            return Ok(Some(id));
        }

        let unit = facility_unit(record, leaf_id, &self.options.defaults);
        match create_unit(&unit, resolver).await? {
            CreateOutcome::Created(id) => {
                info!("Registered PHCU '{}' ({})", record.name, code);
                report.phcu_parents_created.push(code.clone());
                Ok(Some(id))
            }
            CreateOutcome::Rejected(error) => {
                let issue = SyncError::UnresolvedAncestor {
                    facility: record.name.clone(),
                    code: code.clone(),
                    reason: error.to_string(),
                };
                warn!("{}", issue);
                report.issues.push(issue);
                Ok(None)
            }
        }
    }

    /// Destination id of the PHCU parent half a child half points at
    async fn resolve_phcu_parent(
        &self,
        child: &FacilityRecord,
        page: &[FacilityRecord],
        resolver: &mut DestinationResolver<'_>,
        report: &mut PassReport,
    ) -> SyncResult<Option<String>> {
        let Some(parent_code) = child.parent_phcu_id.as_deref() else {
            return Ok(None);
        };
        if let Some(id) = resolver.find_id_by_code(parent_code).await? {
            return Ok(Some(id));
        }

        // The parent half may be on this page but not yet registered
        let Some(sibling) = phcu::find_parent_half(page, parent_code) else {
            return Ok(None);
        };
        let sibling_leaf = match self.tree.find(&sibling.admin_hierarchy_code) {
            Some(node) => self.resolve_ancestors(sibling, node, resolver, report).await?,
            None => None,
        };
        self.register_phcu_parent(sibling, sibling_leaf, resolver, report).await
    }
}

enum CreateOutcome {
    Created(String),
    Rejected(SyncError),
}

/// Create a single unit. A rejection is checked against the destination by
/// code first: a retried create whose first attempt was committed comes
/// back as a conflict.
async fn create_unit(
    unit: &OrgUnit,
    resolver: &mut DestinationResolver<'_>,
) -> SyncResult<CreateOutcome> {
    match resolver.create(unit).await {
        Ok(id) => Ok(CreateOutcome::Created(id)),
        Err(error) if is_rejection(&error) => match resolver.find_id_by_code(&unit.code).await? {
            Some(id) => {
                debug!("Create of '{}' was rejected but the unit exists as {}", unit.code, id);
                Ok(CreateOutcome::Created(id))
            }
            None => Ok(CreateOutcome::Rejected(error)),
        },
        Err(error) => Err(error),
    }
}

/// A non-transient write failure: the destination refused this one item
fn is_rejection(error: &SyncError) -> bool {
    matches!(error, SyncError::DestinationWrite { .. }) && !error.is_retryable()
}
