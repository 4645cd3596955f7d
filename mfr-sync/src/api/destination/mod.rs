//! DHIS2 destination API
//!
//! The sync engine talks to the destination only through [`OrgUnitStore`],
//! so it can run against the HTTP client or an in-memory store.

pub mod client;
pub mod models;
pub mod query;

pub use client::Dhis2Client;
pub use models::{
    IdentifierMode, ImportRejection, ImportStrategy, ImportSummary, OrgUnit, OrgUnitRecord,
    SHORT_NAME_MAX,
};
pub use query::{Filter, OrgUnitQuery};

use async_trait::async_trait;

use crate::error::SyncResult;

/// Find and write operations against the destination org unit store
#[async_trait]
pub trait OrgUnitStore: Send + Sync {
    /// First org unit whose `code` equals `code`
    async fn find_by_code(&self, code: &str) -> SyncResult<Option<OrgUnit>>;

    /// First org unit with this exact name, optionally under a given parent
    async fn find_by_name(&self, name: &str, parent_id: Option<&str>)
    -> SyncResult<Option<OrgUnit>>;

    /// Create a single org unit and return the destination-assigned id
    async fn create(&self, unit: &OrgUnit) -> SyncResult<String>;

    /// Bulk metadata import of many org units
    async fn import(&self, units: &[OrgUnit], strategy: ImportStrategy) -> SyncResult<ImportSummary>;
}
