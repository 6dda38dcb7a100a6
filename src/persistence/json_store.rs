use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info, warn};

use super::persistence_worker::{write_atomic, write_snapshot};
use super::{KnownDevice, MemoryProfileStore, ProfileError, ProfileStore, StoreSnapshot};
use crate::controller::DeviceId;

const MAPPINGS_FILE: &str = "mappings.json";
const CONTROLLERS_FILE: &str = "controllers.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub mappings: PathBuf,
    pub controllers: PathBuf,
}

impl StorePaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            mappings: dir.join(MAPPINGS_FILE),
            controllers: dir.join(CONTROLLERS_FILE),
        }
    }
}

/// Profile store backed by `mappings.json` and `controllers.json`
///
/// All reads and edits happen in memory. [`ProfileStore::snapshot`] serializes
/// both documents for the persistence worker.
pub struct JsonProfileStore {
    paths: StorePaths,
    inner: MemoryProfileStore,
}

impl JsonProfileStore {
    /// Load both documents, creating `mappings.json` from the built-in default
    /// profile when it does not exist yet
    pub async fn open(paths: StorePaths) -> Result<Self, ProfileError> {
        let mappings_doc = read_json(&paths.mappings).await?;
        let controllers_doc = read_json(&paths.controllers).await?;

        let inner = match mappings_doc {
            Some(doc) => MemoryProfileStore::from_documents(&doc, controllers_doc.as_ref()),
            None => {
                info!(
                    "{} not found, creating it from the built-in default profile",
                    paths.mappings.display()
                );
                let store = MemoryProfileStore::from_documents(
                    &serde_json::json!({ "mappings": super::defaults::fallback_mappings() }),
                    controllers_doc.as_ref(),
                );
                let contents = pretty(&store.mappings_document(), "mappings")?;
                write_atomic(&paths.mappings, &contents).await?;
                store
            }
        };

        if !inner.has_default() {
            warn!(
                "{} has no 'default' record; new controllers will stay inactive",
                paths.mappings.display()
            );
        }

        Ok(Self { paths, inner })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Write both documents immediately
    pub async fn flush(&self) -> Result<(), ProfileError> {
        write_snapshot(&self.encode()?).await
    }

    fn encode(&self) -> Result<StoreSnapshot, ProfileError> {
        Ok(StoreSnapshot {
            mappings_path: self.paths.mappings.clone(),
            mappings_json: pretty(&self.inner.mappings_document(), "mappings")?,
            controllers_path: self.paths.controllers.clone(),
            controllers_json: pretty(&self.inner.controllers_document()?, "controllers")?,
        })
    }
}

impl ProfileStore for JsonProfileStore {
    fn load_mapping(&self, device: &DeviceId) -> Option<Value> {
        self.inner.load_mapping(device)
    }

    fn save_mapping(&mut self, device: &DeviceId, record: Value) -> Result<(), ProfileError> {
        self.inner.save_mapping(device, record)
    }

    fn clone_default_into(&mut self, device: &DeviceId) -> Result<Value, ProfileError> {
        self.inner.clone_default_into(device)
    }

    fn remember_device(&mut self, device: &DeviceId, name: &str, seen_at: DateTime<Utc>) {
        self.inner.remember_device(device, name, seen_at)
    }

    fn known_devices(&self) -> BTreeMap<DeviceId, KnownDevice> {
        self.inner.known_devices()
    }

    fn snapshot(&self) -> Option<StoreSnapshot> {
        match self.encode() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!("Failed to encode store snapshot: {}", e);
                None
            }
        }
    }
}

fn pretty(value: &Value, what: &'static str) -> Result<String, ProfileError> {
    serde_json::to_string_pretty(value).map_err(|source| ProfileError::Encode { what, source })
}

/// `Ok(None)` when the file is missing. A file that does not parse is moved
/// aside to `<name>.bak` and treated as missing.
async fn read_json(path: &Path) -> Result<Option<Value>, ProfileError> {
    let io_error = |source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    };

    if !tokio::fs::try_exists(path).await.map_err(io_error)? {
        return Ok(None);
    }

    let content = tokio::fs::read_to_string(path).await.map_err(io_error)?;
    match serde_json::from_str(&content) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let mut backup = path.as_os_str().to_os_string();
            backup.push(".bak");
            error!(
                "Failed to parse {}: {}. Moving it to {}",
                path.display(),
                e,
                PathBuf::from(&backup).display()
            );
            tokio::fs::rename(path, &backup).await.map_err(io_error)?;
            Ok(None)
        }
    }
}
