//! Scripted device source
//!
//! [`VirtualPads`] holds controller state that can be driven from outside the
//! poll driver, e.g. from tests or a replay tool. Cloning shares the state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::device_source::{DeviceEvent, DeviceSource, SourceError};
use super::types::{ButtonEdge, DeviceId, StickSide, TriggerSide};

#[derive(Debug, Default)]
struct PadState {
    sticks: [(i32, i32); 2],
    triggers: [i32; 2],
    edges: Vec<ButtonEdge>,
    failing: bool,
}

#[derive(Debug, Default)]
struct Pads {
    pads: HashMap<DeviceId, PadState>,
    events: Vec<DeviceEvent>,
}

#[derive(Clone, Debug, Default)]
pub struct VirtualPads {
    inner: Arc<Mutex<Pads>>,
}

impl VirtualPads {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pads> {
        // A panicked writer leaves plain data behind; keep using it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn connect(&self, device: &DeviceId, name: &str) {
        let mut pads = self.lock();
        pads.pads.insert(device.clone(), PadState::default());
        pads.events.push(DeviceEvent::Connected {
            device: device.clone(),
            name: name.to_string(),
        });
    }

    pub fn disconnect(&self, device: &DeviceId) {
        let mut pads = self.lock();
        pads.pads.remove(device);
        pads.events.push(DeviceEvent::Disconnected {
            device: device.clone(),
        });
    }

    pub fn set_stick(&self, device: &DeviceId, side: StickSide, x: i32, y: i32) {
        if let Some(pad) = self.lock().pads.get_mut(device) {
            pad.sticks[side.index()] = (x, y);
        }
    }

    pub fn set_trigger(&self, device: &DeviceId, side: TriggerSide, value: i32) {
        if let Some(pad) = self.lock().pads.get_mut(device) {
            pad.triggers[side.index()] = value;
        }
    }

    pub fn push_edge(&self, device: &DeviceId, edge: ButtonEdge) {
        if let Some(pad) = self.lock().pads.get_mut(device) {
            pad.edges.push(edge);
        }
    }

    /// Make every read for `device` fail until cleared
    pub fn set_failing(&self, device: &DeviceId, failing: bool) {
        if let Some(pad) = self.lock().pads.get_mut(device) {
            pad.failing = failing;
        }
    }
}

impl VirtualPads {
    fn with_pad<T>(
        &self,
        device: &DeviceId,
        read: impl FnOnce(&mut PadState) -> T,
    ) -> Result<T, SourceError> {
        let mut pads = self.lock();
        let pad = pads
            .pads
            .get_mut(device)
            .ok_or_else(|| SourceError::NotConnected(device.clone()))?;
        if pad.failing {
            return Err(SourceError::Read {
                device: device.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(read(pad))
    }
}

impl DeviceSource for VirtualPads {
    fn poll_events(&mut self) -> Vec<DeviceEvent> {
        std::mem::take(&mut self.lock().events)
    }

    fn read_stick(&mut self, device: &DeviceId, side: StickSide) -> Result<(i32, i32), SourceError> {
        self.with_pad(device, |pad| pad.sticks[side.index()])
    }

    fn read_trigger(&mut self, device: &DeviceId, side: TriggerSide) -> Result<i32, SourceError> {
        self.with_pad(device, |pad| pad.triggers[side.index()])
    }

    fn read_button_edges(&mut self, device: &DeviceId) -> Result<Vec<ButtonEdge>, SourceError> {
        self.with_pad(device, |pad| std::mem::take(&mut pad.edges))
    }
}
