//! Error types for the sync engine
//!
//! Every failure the engine can surface is a [`SyncError`] variant. Whether a
//! failure is worth retrying is decided here, so the resilience layer never
//! has to inspect transport details itself.

use thiserror::Error;

use crate::api::resilience::RetryableError;

/// Result alias used throughout the library
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors produced while reconciling the hierarchy or syncing facilities
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The cursor store could not be read
    #[error("cursor read failed for '{key}': {message}")]
    CursorRead { key: String, message: String },

    /// The cursor store could not be written
    #[error("cursor write failed for '{key}': {message}")]
    CursorWrite { key: String, message: String },

    /// Network failure or API-reported error from the source registry
    #[error("source registry fetch failed: {message}")]
    SourceFetch {
        message: String,
        status: Option<u16>,
        transient: bool,
    },

    /// Network failure or API-reported error while querying the destination
    #[error("destination fetch failed: {message}")]
    DestinationFetch {
        message: String,
        status: Option<u16>,
        transient: bool,
    },

    /// The destination rejected or failed a write
    #[error("destination write failed: {message}")]
    DestinationWrite {
        message: String,
        status: Option<u16>,
        transient: bool,
    },

    /// The hierarchy document cannot be turned into a tree
    #[error("malformed hierarchy: {0}")]
    MalformedHierarchy(String),

    /// A facility references a hierarchy node that cannot be placed
    #[error("facility '{facility}' cannot be placed under hierarchy node '{code}': {reason}")]
    UnresolvedAncestor {
        facility: String,
        code: String,
        reason: String,
    },

    /// A tree node's parent was not resolvable during reconciliation
    #[error("reconciliation gap: node '{code}' skipped, parent '{parent_code}' is missing")]
    ReconciliationGap { code: String, parent_code: String },

    /// An org unit that must already exist was not found
    #[error("org unit with code '{code}' not found ({context})")]
    NotFound { code: String, context: String },

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn source_fetch(message: impl Into<String>) -> Self {
        Self::SourceFetch {
            message: message.into(),
            status: None,
            transient: false,
        }
    }

    pub fn destination_fetch(message: impl Into<String>) -> Self {
        Self::DestinationFetch {
            message: message.into(),
            status: None,
            transient: false,
        }
    }

    pub fn destination_write(message: impl Into<String>) -> Self {
        Self::DestinationWrite {
            message: message.into(),
            status: None,
            transient: false,
        }
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CursorRead { .. } => "CursorReadError",
            Self::CursorWrite { .. } => "CursorWriteError",
            Self::SourceFetch { .. } => "SourceFetchError",
            Self::DestinationFetch { .. } => "DestinationFetchError",
            Self::DestinationWrite { .. } => "DestinationWriteError",
            Self::MalformedHierarchy(_) => "MalformedHierarchyError",
            Self::UnresolvedAncestor { .. } => "UnresolvedAncestorError",
            Self::ReconciliationGap { .. } => "ReconciliationGap",
            Self::NotFound { .. } => "NotFound",
            Self::Config(_) => "ConfigError",
        }
    }

    /// HTTP status attached to a network error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SourceFetch { status, .. }
            | Self::DestinationFetch { status, .. }
            | Self::DestinationWrite { status, .. } => *status,
            _ => None,
        }
    }
}

impl RetryableError for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::SourceFetch { transient, .. }
            | Self::DestinationFetch { transient, .. }
            | Self::DestinationWrite { transient, .. } => *transient,
            _ => false,
        }
    }
}

/// Classify an HTTP status as transient (worth retrying)
pub fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

/// Which side of the sync a transport error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    DestinationRead,
    DestinationWrite,
}

/// Convert a reqwest error into a [`SyncError`] for the given side.
///
/// Connection failures and timeouts are transient; decode failures are not.
pub fn from_transport(side: Side, err: reqwest::Error) -> SyncError {
    let status = err.status().map(|s| s.as_u16());
    let transient = err.is_timeout()
        || err.is_connect()
        || err.is_request()
        || status.map(is_transient_status).unwrap_or(false);
    let message = err.to_string();
    match side {
        Side::Source => SyncError::SourceFetch {
            message,
            status,
            transient,
        },
        Side::DestinationRead => SyncError::DestinationFetch {
            message,
            status,
            transient,
        },
        Side::DestinationWrite => SyncError::DestinationWrite {
            message,
            status,
            transient,
        },
    }
}

/// Build a [`SyncError`] from a non-success HTTP response status and body
pub fn from_status(side: Side, status: u16, body: &str) -> SyncError {
    let transient = is_transient_status(status);
    let message = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, truncate_body(body))
    };
    match side {
        Side::Source => SyncError::SourceFetch {
            message,
            status: Some(status),
            transient,
        },
        Side::DestinationRead => SyncError::DestinationFetch {
            message,
            status: Some(status),
            transient,
        },
        Side::DestinationWrite => SyncError::DestinationWrite {
            message,
            status: Some(status),
            transient,
        },
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(503));
        assert!(is_transient_status(429));
        assert!(is_transient_status(408));
        assert!(!is_transient_status(404));
        assert!(!is_transient_status(409));
    }

    #[test]
    fn test_from_status_classification() {
        let err = from_status(Side::Source, 502, "bad gateway");
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "SourceFetchError");
        assert_eq!(err.status(), Some(502));

        let err = from_status(Side::DestinationWrite, 409, "conflict");
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "DestinationWriteError");
    }

    #[test]
    fn test_domain_errors_not_retryable() {
        assert!(!SyncError::source_fetch("embedded error").is_retryable());
        assert!(!SyncError::MalformedHierarchy("no root".into()).is_retryable());
        let err = SyncError::NotFound {
            code: "ET-1".into(),
            context: "facility".into(),
        };
        assert!(!err.is_retryable());
    }
}
