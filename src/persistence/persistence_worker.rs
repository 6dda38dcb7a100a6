//! Background writer for store snapshots
//!
//! The poll driver never touches the filesystem. It pushes a [`StoreSnapshot`]
//! after every change and this worker writes the newest one. Snapshots that
//! queue up while a write is in flight are coalesced to the latest.

use std::path::Path;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{ProfileError, StoreSnapshot};

pub struct PersistenceWorker {
    worker_handle: JoinHandle<()>,
}

impl PersistenceWorker {
    /// Spawn the writer. It exits once every sender has been dropped and the
    /// last pending snapshot is on disk.
    pub fn spawn() -> (UnboundedSender<StoreSnapshot>, Self) {
        let (tx, rx) = unbounded_channel::<StoreSnapshot>();
        let worker_handle = tokio::spawn(run_worker(rx));
        info!("Persistence worker started");
        (tx, Self { worker_handle })
    }

    pub async fn join(self) -> Result<(), ProfileError> {
        self.worker_handle
            .await
            .map_err(|e| ProfileError::Worker(e.to_string()))
    }
}

async fn run_worker(mut rx: UnboundedReceiver<StoreSnapshot>) {
    while let Some(mut snapshot) = rx.recv().await {
        while let Ok(newer) = rx.try_recv() {
            snapshot = newer;
        }
        match write_snapshot(&snapshot).await {
            Ok(()) => debug!(
                "Persisted {} and {}",
                snapshot.mappings_path.display(),
                snapshot.controllers_path.display()
            ),
            Err(e) => error!("Failed to persist mappings: {}", e),
        }
    }
    info!("Persistence worker stopped");
}

pub async fn write_snapshot(snapshot: &StoreSnapshot) -> Result<(), ProfileError> {
    write_atomic(&snapshot.mappings_path, &snapshot.mappings_json).await?;
    write_atomic(&snapshot.controllers_path, &snapshot.controllers_json).await
}

/// Write to a sibling temp file and rename it over `path`
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), ProfileError> {
    let io_error = |source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(io_error)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot(dir: &Path, marker: &str) -> StoreSnapshot {
        StoreSnapshot {
            mappings_path: dir.join("mappings.json"),
            mappings_json: format!("{{\"mappings\":{{\"{marker}\":{{}}}}}}"),
            controllers_path: dir.join("controllers.json"),
            controllers_json: "{\"controllers\":[]}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_worker_writes_latest_snapshot() {
        let dir = TempDir::new().unwrap();
        let (tx, worker) = PersistenceWorker::spawn();

        tx.send(snapshot(dir.path(), "first")).unwrap();
        tx.send(snapshot(dir.path(), "second")).unwrap();
        drop(tx);
        worker.join().await.unwrap();

        let written = tokio::fs::read_to_string(dir.path().join("mappings.json"))
            .await
            .unwrap();
        assert!(written.contains("second"));
        assert!(!dir.path().join("mappings.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/controllers.json");

        write_atomic(&path, "{}").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "{}");
    }
}
