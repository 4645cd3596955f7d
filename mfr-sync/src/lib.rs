//! Synchronizes health facilities from a Resource Map master facility
//! registry into DHIS2 organisation units.
//!
//! The administrative hierarchy is rebuilt from the registry on every run
//! and reconciled into the destination breadth-first. Facilities are then
//! pulled page by page for the `added` and `updated` streams and placed
//! under their administrative unit.

pub mod api;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod services;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{SyncError, SyncResult};
pub use sync::{RunFailure, StreamKind, SyncReport, SyncRunner};
