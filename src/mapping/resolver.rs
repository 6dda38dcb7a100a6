//! Read-through mapping cache
//!
//! The poll loop asks for a device's mapping every tick, so decoded records
//! are cached per identity. Any write through the resolver drops the cached
//! entry and the next read decodes the stored JSON again.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::codec::{ensure_object, object_entry};
use super::error::MappingError;
use super::types::{ButtonMapping, MappingRecord, StickMapping, TriggerMapping};
use crate::controller::{ButtonType, DeviceId, StickSide, TriggerSide};
use crate::persistence::{ProfileError, ProfileStore};

pub struct MappingResolver {
    store: Box<dyn ProfileStore>,
    cache: HashMap<DeviceId, Arc<MappingRecord>>,
}

impl MappingResolver {
    pub fn new(store: Box<dyn ProfileStore>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    pub fn store(&self) -> &dyn ProfileStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn ProfileStore {
        self.store.as_mut()
    }

    pub fn is_cached(&self, device: &DeviceId) -> bool {
        self.cache.contains_key(device)
    }

    /// Decoded record for `device`, cloning `default` into the store on first sight
    pub fn record(&mut self, device: &DeviceId) -> Result<Arc<MappingRecord>, MappingError> {
        if let Some(record) = self.cache.get(device) {
            return Ok(Arc::clone(record));
        }

        let raw = match self.store.load_mapping(device) {
            Some(raw) => raw,
            None => {
                let raw = self
                    .store
                    .clone_default_into(device)
                    .map_err(|e| missing_default(e, device))?;
                info!("No mapping stored for {}, cloned 'default'", device);
                raw
            }
        };

        let record = Arc::new(MappingRecord::from_json(&raw));
        debug!("Cached mapping for {}: {}", device, record.summary());
        self.cache.insert(device.clone(), Arc::clone(&record));
        Ok(record)
    }

    pub fn get_stick(
        &mut self,
        device: &DeviceId,
        side: StickSide,
    ) -> Result<StickMapping, MappingError> {
        Ok(self.record(device)?.stick(side).clone())
    }

    pub fn get_trigger(
        &mut self,
        device: &DeviceId,
        side: TriggerSide,
    ) -> Result<TriggerMapping, MappingError> {
        Ok(self.record(device)?.trigger(side).clone())
    }

    pub fn get_button(
        &mut self,
        device: &DeviceId,
        button: ButtonType,
    ) -> Result<ButtonMapping, MappingError> {
        Ok(self.record(device)?.button(button).clone())
    }

    pub fn set_stick(
        &mut self,
        device: &DeviceId,
        side: StickSide,
        mapping: &StickMapping,
    ) -> Result<(), MappingError> {
        self.update(device, |raw| {
            ensure_object(raw).insert(side.key().to_string(), mapping.to_json());
        })
    }

    pub fn set_trigger(
        &mut self,
        device: &DeviceId,
        side: TriggerSide,
        mapping: &TriggerMapping,
    ) -> Result<(), MappingError> {
        self.update(device, |raw| {
            object_entry(raw, "triggers").insert(side.key().to_string(), mapping.to_json());
        })
    }

    pub fn set_button(
        &mut self,
        device: &DeviceId,
        button: ButtonType,
        mapping: &ButtonMapping,
    ) -> Result<(), MappingError> {
        self.update(device, |raw| {
            object_entry(raw, "buttons").insert(button.name().to_string(), mapping.to_json());
        })
    }

    /// Drop one cached record, or all of them when `device` is `None`
    pub fn invalidate(&mut self, device: Option<&DeviceId>) {
        match device {
            Some(device) => {
                self.cache.remove(device);
            }
            None => self.cache.clear(),
        }
    }

    fn update(
        &mut self,
        device: &DeviceId,
        edit: impl FnOnce(&mut Value),
    ) -> Result<(), MappingError> {
        let mut raw = match self.store.load_mapping(device) {
            Some(raw) => raw,
            None => match self.store.clone_default_into(device) {
                Ok(raw) => raw,
                // Editing a device with nothing to clone starts from an empty record
                Err(ProfileError::MissingDefault) => Value::Object(Map::new()),
                Err(e) => return Err(e.into()),
            },
        };
        edit(&mut raw);
        self.store.save_mapping(device, raw)?;
        self.invalidate(Some(device));
        Ok(())
    }
}

fn missing_default(error: ProfileError, device: &DeviceId) -> MappingError {
    match error {
        ProfileError::MissingDefault => MappingError::MissingDefault(device.clone()),
        other => MappingError::Store(other),
    }
}
