//! Run reports and the orchestration log

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::cursor::StreamKind;
use crate::api::destination::{ImportRejection, ImportSummary};
use crate::error::SyncError;
use crate::hierarchy::ReconcileReport;

/// One step of a run, in the order it happened
#[derive(Debug, Clone)]
pub struct OrchestrationEntry {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

/// Outcome of one Added or Updated pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub stream: StreamKind,
    /// Cursor value the pass started from
    pub since: String,
    pub pages: usize,
    pub records: usize,
    /// Org units handed to bulk imports
    pub submitted: usize,
    pub imported: usize,
    /// Hierarchy codes created while resolving facility ancestors
    pub ancestors_created: Vec<String>,
    /// National identifiers of PHCU parent halves created by this pass
    pub phcu_parents_created: Vec<String>,
    pub rejections: Vec<ImportRejection>,
    /// Per-record problems that did not abort the pass
    pub issues: Vec<SyncError>,
    /// Set once the pass completed and its cursor was persisted
    pub cursor_advanced_to: Option<String>,
}

impl PassReport {
    pub fn new(stream: StreamKind) -> Self {
        Self {
            stream,
            since: String::new(),
            pages: 0,
            records: 0,
            submitted: 0,
            imported: 0,
            ancestors_created: Vec::new(),
            phcu_parents_created: Vec::new(),
            rejections: Vec::new(),
            issues: Vec::new(),
            cursor_advanced_to: None,
        }
    }

    pub fn absorb(&mut self, submitted: usize, summary: ImportSummary) {
        self.submitted += submitted;
        self.imported += summary.imported.len();
        self.rejections.extend(summary.rejections);
    }

    pub fn is_complete(&self) -> bool {
        self.cursor_advanced_to.is_some()
    }
}

/// Everything a run did, also returned (partially) when it fails
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub collection: Option<String>,
    pub reconcile: Option<ReconcileReport>,
    pub passes: Vec<PassReport>,
    pub orchestrations: Vec<OrchestrationEntry>,
}

impl SyncReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            collection: None,
            reconcile: None,
            passes: Vec::new(),
            orchestrations: Vec::new(),
        }
    }

    pub fn record(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        self.orchestrations.push(OrchestrationEntry {
            name: name.into(),
            timestamp: Utc::now(),
            detail: detail.into(),
        });
    }

    pub fn pass(&self, stream: StreamKind) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.stream == stream)
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

impl Default for SyncReport {
    fn default() -> Self {
        Self::new()
    }
}

/// A failed run: the error kind plus everything collected before it
#[derive(Debug, Clone)]
pub struct RunFailure {
    pub error: SyncError,
    pub report: SyncReport,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} after {} orchestration steps: {}",
            self.error.kind(),
            self.report.orchestrations.len(),
            self.error
        )
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
