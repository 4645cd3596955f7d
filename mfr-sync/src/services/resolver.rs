//! Find-or-create resolution of destination org units
//!
//! Wraps an [`OrgUnitStore`] with a run-scoped memo of `code -> id`. The memo
//! is consulted before every lookup by code and filled by every successful
//! lookup, create and import, so ancestors shared by many facilities are
//! queried once per run. A resolver must not outlive the run that created it.

use log::debug;
use std::collections::HashMap;

use crate::api::destination::{ImportStrategy, ImportSummary, OrgUnit, OrgUnitStore};
use crate::error::SyncResult;

/// Counters for destination traffic issued through a resolver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub lookups: usize,
    pub memo_hits: usize,
    pub creates: usize,
    pub imports: usize,
}

pub struct DestinationResolver<'a> {
    store: &'a dyn OrgUnitStore,
    memo: HashMap<String, String>,
    stats: ResolverStats,
}

impl<'a> DestinationResolver<'a> {
    pub fn new(store: &'a dyn OrgUnitStore) -> Self {
        Self {
            store,
            memo: HashMap::new(),
            stats: ResolverStats::default(),
        }
    }

    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    /// Id already resolved for `code` during this run, without any request
    pub fn cached(&self, code: &str) -> Option<&str> {
        self.memo.get(code).map(String::as_str)
    }

    pub fn remember(&mut self, code: impl Into<String>, id: impl Into<String>) {
        self.memo.insert(code.into(), id.into());
    }

    /// Full org unit with this code, always asking the destination
    pub async fn find_by_code(&mut self, code: &str) -> SyncResult<Option<OrgUnit>> {
        self.stats.lookups += 1;
        let found = self.store.find_by_code(code).await?;
        if let Some(unit) = &found {
            if let Some(id) = &unit.id {
                self.memo.insert(code.to_string(), id.clone());
            }
        }
        Ok(found)
    }

    /// Destination id for `code`, from the memo when possible
    pub async fn find_id_by_code(&mut self, code: &str) -> SyncResult<Option<String>> {
        if let Some(id) = self.memo.get(code) {
            self.stats.memo_hits += 1;
            return Ok(Some(id.clone()));
        }
        Ok(self.find_by_code(code).await?.and_then(|unit| unit.id))
    }

    /// Destination id of the unit named `name` under `parent_id`
    pub async fn find_id_by_name(
        &mut self,
        name: &str,
        parent_id: Option<&str>,
    ) -> SyncResult<Option<String>> {
        self.stats.lookups += 1;
        let found = self.store.find_by_name(name, parent_id).await?;
        Ok(found.and_then(|unit| {
            let id = unit.id?;
            if !unit.code.is_empty() {
                self.memo.insert(unit.code.clone(), id.clone());
            }
            Some(id)
        }))
    }

    /// Create a single unit and remember its id under its code
    pub async fn create(&mut self, unit: &OrgUnit) -> SyncResult<String> {
        let id = self.store.create(unit).await?;
        self.stats.creates += 1;
        debug!("Created org unit '{}' ({}) as {}", unit.name, unit.code, id);
        self.memo.insert(unit.code.clone(), id.clone());
        Ok(id)
    }

    /// Resolve `unit.code`, creating the unit when it does not exist yet
    pub async fn find_or_create(&mut self, unit: &OrgUnit) -> SyncResult<(String, bool)> {
        if let Some(id) = self.find_id_by_code(&unit.code).await? {
            return Ok((id, false));
        }
        let id = self.create(unit).await?;
        Ok((id, true))
    }

    /// Bulk import; accepted ids are remembered under their codes
    pub async fn import(
        &mut self,
        units: &[OrgUnit],
        strategy: ImportStrategy,
    ) -> SyncResult<ImportSummary> {
        if units.is_empty() {
            return Ok(ImportSummary::default());
        }
        let summary = self.store.import(units, strategy).await?;
        self.stats.imports += 1;
        for (code, id) in &summary.imported {
            self.memo.insert(code.clone(), id.clone());
        }
        Ok(summary)
    }
}
