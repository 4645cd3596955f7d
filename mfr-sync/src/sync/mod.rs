//! Facility synchronization: cursors, projection, the paginated sync engine
//! and run orchestration

pub mod cursor;
pub mod engine;
pub mod phcu;
pub mod projection;
pub mod report;
pub mod runner;
pub mod short_name;

pub use cursor::{
    CURSOR_FORMAT, CursorStore, FileCursorStore, MemoryCursorStore, StreamKind,
    format_timestamp, parse_timestamp,
};
pub use engine::{EngineOptions, FacilitySyncEngine};
pub use projection::{UnitDefaults, facility_unit, hierarchy_unit};
pub use report::{OrchestrationEntry, PassReport, RunFailure, SyncReport};
pub use runner::{RunSettings, SyncRunner};
pub use short_name::{abbreviate, short_name_for};
