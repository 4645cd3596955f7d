use tempfile::TempDir;

use mfr_sync::SyncError;
use mfr_sync::sync::{CursorStore, FileCursorStore, StreamKind};

#[tokio::test]
async fn test_cursor_survives_a_new_store() {
    let dir = TempDir::new().unwrap();
    let store = FileCursorStore::new(dir.path().join("cursors"));
    assert!(store.get(StreamKind::Added).await.unwrap().is_none());

    store.set(StreamKind::Added, "2024-05-01T10:00:00Z").await.unwrap();

    let reopened = FileCursorStore::new(dir.path().join("cursors"));
    assert_eq!(
        reopened.get(StreamKind::Added).await.unwrap().as_deref(),
        Some("2024-05-01T10:00:00Z")
    );
    assert!(reopened.get(StreamKind::Updated).await.unwrap().is_none());
    assert!(dir.path().join("cursors").join("last_added").exists());
    assert!(!dir.path().join("cursors").join("last_added.tmp").exists());
}

#[tokio::test]
async fn test_garbage_cursor_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("last_updated"), "yesterday").unwrap();
    let store = FileCursorStore::new(dir.path());

    let err = store.get(StreamKind::Updated).await.unwrap_err();
    assert!(matches!(err, SyncError::CursorRead { ref key, .. } if key == "last_updated"));
}

#[tokio::test]
async fn test_trailing_newline_is_ignored() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("last_added"), "2023-12-31T23:59:59Z\n").unwrap();
    let store = FileCursorStore::new(dir.path());

    assert_eq!(
        store.get(StreamKind::Added).await.unwrap().as_deref(),
        Some("2023-12-31T23:59:59Z")
    );
}
