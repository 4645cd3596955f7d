//! Resource Map (MFR) source registry API

pub mod client;
pub mod models;

pub use client::RegistryClient;
pub use models::{
    Collection, FacilityRecord, FlexibleId, Layer, LayerField, PropertyKeys, RawSite, SitePage,
    find_hierarchy,
};

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::sync::StreamKind;

/// Position in a paginated site stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// First page of a stream, filtered by the stream's timestamp parameter
    First {
        collection_id: String,
        stream: StreamKind,
        since: String,
    },
    /// Opaque `nextPage` URL handed out by the registry
    Next(String),
}

impl PageCursor {
    pub fn first(collection_id: impl Into<String>, stream: StreamKind, since: impl Into<String>) -> Self {
        PageCursor::First {
            collection_id: collection_id.into(),
            stream,
            since: since.into(),
        }
    }
}

/// Read operations against the source registry
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    async fn collections(&self) -> SyncResult<Vec<Collection>>;

    /// Layer and field definitions of a collection
    async fn layers(&self, collection_id: &str) -> SyncResult<Vec<Layer>>;

    /// Fetch one page of sites. Embedded API errors are returned inside the
    /// page; transport failures are returned as errors.
    async fn fetch_page(&self, cursor: &PageCursor) -> SyncResult<SitePage>;

    async fn site(&self, site_id: &str) -> SyncResult<RawSite>;
}
