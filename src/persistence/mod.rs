//! # Persistence Module
//!
//! ## Why This Module Exists
//! Mapping records and the list of known controllers outlive a single run. This
//! module owns both documents, hands mapping records to the resolver as JSON and
//! writes snapshots back to disk without ever blocking the poll loop.
//!
//! ## Key Abstractions
//! - **[`ProfileStore`]**: synchronous in-memory view used by the engine
//! - **[`MemoryProfileStore`]**: plain store, also the core of the JSON store
//! - **[`JsonProfileStore`]**: `mappings.json` + `controllers.json` on disk
//! - **[`persistence_worker`]**: async writer fed with [`StoreSnapshot`]s
//!
//! ## Error Handling Strategy
//! Missing or corrupted files degrade to defaults with a logged warning. Only
//! I/O failures while writing surface as [`ProfileError`].

pub mod defaults;
pub mod json_store;
pub mod persistence_worker;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::controller::{DeviceId, DEFAULT_PROFILE};
use crate::mapping::codec::merge_json;

pub use json_store::{JsonProfileStore, StorePaths};
pub use persistence_worker::PersistenceWorker;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Mapping store has no '{}' record", DEFAULT_PROFILE)]
    MissingDefault,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Persistence worker error: {0}")]
    Worker(String),
}

/// A controller identity that has been connected at least once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownDevice {
    pub name: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Serialized store contents ready to be written by the persistence worker
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub mappings_path: PathBuf,
    pub mappings_json: String,
    pub controllers_path: PathBuf,
    pub controllers_json: String,
}

/// Storage of mapping records and known controllers
///
/// Mapping records are exchanged as raw JSON so that keys this version does not
/// understand survive a load/save cycle.
pub trait ProfileStore: Send {
    fn load_mapping(&self, device: &DeviceId) -> Option<Value>;

    fn save_mapping(&mut self, device: &DeviceId, record: Value) -> Result<(), ProfileError>;

    /// Deep-copy the `default` record under `device` and return the copy
    fn clone_default_into(&mut self, device: &DeviceId) -> Result<Value, ProfileError>;

    /// Record a connection; updates the name and `last_seen` of known devices
    fn remember_device(&mut self, device: &DeviceId, name: &str, seen_at: DateTime<Utc>);

    fn known_devices(&self) -> BTreeMap<DeviceId, KnownDevice>;

    /// Contents to write back to disk, if the store is file-backed
    fn snapshot(&self) -> Option<StoreSnapshot> {
        None
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ControllersFile {
    #[serde(default)]
    controllers: Vec<ControllerEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ControllerEntry {
    guid: DeviceId,
    name: String,
    #[serde(default = "Utc::now")]
    first_seen: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    mappings: Map<String, Value>,
    known: BTreeMap<DeviceId, KnownDevice>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the built-in default profile
    pub fn with_fallback_default() -> Self {
        Self::from_mappings(defaults::fallback_mappings())
    }

    /// Build from the object found under `mappings` in `mappings.json`
    pub fn from_mappings(mappings: Value) -> Self {
        let mappings = match mappings {
            Value::Object(map) => map,
            other => {
                warn!("Ignoring mappings of unexpected type: {}", other);
                Map::new()
            }
        };
        Self {
            mappings,
            known: BTreeMap::new(),
        }
    }

    /// Decode the full contents of `mappings.json` and `controllers.json`
    pub fn from_documents(mappings_doc: &Value, controllers_doc: Option<&Value>) -> Self {
        let mappings = match mappings_doc.get("mappings") {
            Some(mappings) => mappings.clone(),
            None => {
                warn!("mappings document has no 'mappings' object");
                Value::Object(Map::new())
            }
        };
        let mut store = Self::from_mappings(mappings);

        if let Some(doc) = controllers_doc {
            match serde_json::from_value::<ControllersFile>(doc.clone()) {
                Ok(file) => {
                    for entry in file.controllers {
                        store.known.insert(
                            entry.guid,
                            KnownDevice {
                                name: entry.name,
                                first_seen: entry.first_seen,
                                last_seen: entry.last_seen,
                            },
                        );
                    }
                }
                Err(e) => warn!("Ignoring malformed controllers document: {}", e),
            }
        }
        store
    }

    pub fn mappings_document(&self) -> Value {
        json!({ "mappings": self.mappings })
    }

    pub fn controllers_document(&self) -> Result<Value, ProfileError> {
        let file = ControllersFile {
            controllers: self
                .known
                .iter()
                .map(|(guid, known)| ControllerEntry {
                    guid: guid.clone(),
                    name: known.name.clone(),
                    first_seen: known.first_seen,
                    last_seen: known.last_seen,
                })
                .collect(),
        };
        serde_json::to_value(file).map_err(|source| ProfileError::Encode {
            what: "controllers",
            source,
        })
    }

    pub fn has_default(&self) -> bool {
        self.mappings.contains_key(DEFAULT_PROFILE)
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load_mapping(&self, device: &DeviceId) -> Option<Value> {
        self.mappings.get(device.as_str()).cloned()
    }

    fn save_mapping(&mut self, device: &DeviceId, record: Value) -> Result<(), ProfileError> {
        debug!("Saving mapping for {}", device);
        self.mappings.insert(device.as_str().to_string(), record);
        Ok(())
    }

    fn clone_default_into(&mut self, device: &DeviceId) -> Result<Value, ProfileError> {
        let mut record = self
            .mappings
            .get(DEFAULT_PROFILE)
            .cloned()
            .ok_or(ProfileError::MissingDefault)?;
        if let Some(known) = self.known.get(device) {
            merge_json(&mut record, &json!({ "name": known.name }));
        }
        self.mappings
            .insert(device.as_str().to_string(), record.clone());
        Ok(record)
    }

    fn remember_device(&mut self, device: &DeviceId, name: &str, seen_at: DateTime<Utc>) {
        self.known
            .entry(device.clone())
            .and_modify(|known| {
                known.name = name.to_string();
                known.last_seen = seen_at;
            })
            .or_insert_with(|| KnownDevice {
                name: name.to_string(),
                first_seen: seen_at,
                last_seen: seen_at,
            });
    }

    fn known_devices(&self) -> BTreeMap<DeviceId, KnownDevice> {
        self.known.clone()
    }
}
