//! Snapshot Task
//!
//! Background task that periodically writes the durable store to disk so it
//! survives restarts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::{DurableStore, SharedStore};

/// Loads a store from `path`.
///
/// A missing file yields an empty store.
pub async fn load_snapshot(path: &Path) -> Result<DurableStore> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let store = DurableStore::from_snapshot(&contents)?;
            info!(
                "Loaded {} cached responses from {}",
                store.total_entries(),
                path.display()
            );
            Ok(store)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No snapshot at {}, starting empty", path.display());
            Ok(DurableStore::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Writes the store to `path` atomically (temp file, then rename).
///
/// Returns the number of entries written.
pub async fn persist_snapshot(store: &SharedStore, path: &Path) -> Result<usize> {
    let (snapshot, entries) = {
        let guard = store.read().await;
        (guard.to_snapshot()?, guard.total_entries())
    };

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, snapshot).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(entries)
}

/// Spawns a background task that snapshots the store every `interval_secs`.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_snapshot_task(store: SharedStore, path: PathBuf, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting snapshot task for {} with interval of {} seconds",
            path.display(),
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match persist_snapshot(&store, &path).await {
                Ok(entries) => debug!("Snapshot: wrote {} entries", entries),
                Err(e) => warn!("Snapshot failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{shared, CachedResponse};

    fn populated() -> SharedStore {
        let mut store = DurableStore::new();
        store
            .put("gen-v1", "http://o/data/a.json", CachedResponse::text(200, "a"))
            .unwrap();
        shared(store)
    }

    #[tokio::test]
    async fn test_persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let written = persist_snapshot(&populated(), &path).await.unwrap();
        assert_eq!(written, 1);

        let loaded = load_snapshot(&path).await.unwrap();
        assert_eq!(
            loaded.get("gen-v1", "http://o/data/a.json").unwrap().body,
            b"a"
        );
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_snapshot(&dir.path().join("absent.json")).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        assert!(load_snapshot(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_task_writes_periodically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let handle = spawn_snapshot_task(populated(), path.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(path.exists(), "Snapshot should have been written");
        handle.abort();
    }

    #[tokio::test]
    async fn test_snapshot_task_can_be_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let handle = spawn_snapshot_task(populated(), dir.path().join("s.json"), 1);

        handle.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
