//! Persisted "last successfully synced" timestamps
//!
//! One cursor per stream kind, stored under the names `last_added` and
//! `last_updated`. Values are UTC timestamps in [`CURSOR_FORMAT`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{SyncError, SyncResult};

/// Timestamp format of persisted cursors
pub const CURSOR_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Which record stream a pass synchronizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Added,
    Updated,
}

impl StreamKind {
    /// Name of the persisted cursor for this stream
    pub fn cursor_key(&self) -> &'static str {
        match self {
            StreamKind::Added => "last_added",
            StreamKind::Updated => "last_updated",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Added => "added",
            StreamKind::Updated => "updated",
        }
    }

    pub fn all() -> [StreamKind; 2] {
        [StreamKind::Added, StreamKind::Updated]
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(CURSOR_FORMAT).to_string()
}

/// Validate a timestamp against [`CURSOR_FORMAT`]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), CURSOR_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Get/set access to persisted cursors
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// `None` when the cursor has never been written
    async fn get(&self, kind: StreamKind) -> SyncResult<Option<String>>;

    async fn set(&self, kind: StreamKind, timestamp: &str) -> SyncResult<()>;
}

/// Stores each cursor in its own file inside a directory
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    dir: PathBuf,
}

impl FileCursorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: StreamKind) -> PathBuf {
        self.dir.join(kind.cursor_key())
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn get(&self, kind: StreamKind) -> SyncResult<Option<String>> {
        let path = self.path_for(kind);
        let read_error = |message: String| SyncError::CursorRead {
            key: kind.cursor_key().to_string(),
            message,
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_error(format!("{}: {}", path.display(), e))),
        };

        let value = content.trim();
        if value.is_empty() {
            return Ok(None);
        }
        if parse_timestamp(value).is_none() {
            return Err(read_error(format!(
                "'{}' in {} is not a {} timestamp",
                value,
                path.display(),
                CURSOR_FORMAT
            )));
        }
        Ok(Some(value.to_string()))
    }

    async fn set(&self, kind: StreamKind, timestamp: &str) -> SyncResult<()> {
        let write_error = |message: String| SyncError::CursorWrite {
            key: kind.cursor_key().to_string(),
            message,
        };
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_error(format!("{}: {}", self.dir.display(), e)))?;

        // Write then rename so a crash never leaves a half-written cursor
        let path = self.path_for(kind);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, timestamp)
            .await
            .map_err(|e| write_error(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| write_error(format!("{}: {}", path.display(), e)))?;

        debug!("Cursor {} set to {}", kind.cursor_key(), timestamp);
        Ok(())
    }
}

/// Process-local cursor store, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    values: Mutex<HashMap<StreamKind, String>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(kind: StreamKind, timestamp: &str) -> Self {
        let store = Self::new();
        store.insert(kind, timestamp);
        store
    }

    fn insert(&self, kind: StreamKind, timestamp: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(kind, timestamp.to_string());
        }
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, kind: StreamKind) -> SyncResult<Option<String>> {
        let values = self.values.lock().map_err(|_| SyncError::CursorRead {
            key: kind.cursor_key().to_string(),
            message: "cursor store lock poisoned".into(),
        })?;
        Ok(values.get(&kind).cloned())
    }

    async fn set(&self, kind: StreamKind, timestamp: &str) -> SyncResult<()> {
        let mut values = self.values.lock().map_err(|_| SyncError::CursorWrite {
            key: kind.cursor_key().to_string(),
            message: "cursor store lock poisoned".into(),
        })?;
        values.insert(kind, timestamp.to_string());
        Ok(())
    }
}
