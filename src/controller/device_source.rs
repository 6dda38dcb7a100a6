//! Device source abstraction
//!
//! The poll driver never talks to a gamepad library directly. It asks a
//! [`DeviceSource`] for connection events and per-device raw samples, which keeps
//! the translation engine testable with scripted input.

use super::types::{ButtonEdge, DeviceId, DeviceSample, StickSide, TriggerSide};

/// Connection lifecycle events reported by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected { device: DeviceId, name: String },
    Disconnected { device: DeviceId },
}

// Source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to initialize device source: {0}")]
    Initialization(String),

    #[error("Device not connected: {0}")]
    NotConnected(DeviceId),

    #[error("Failed to read device {device}: {reason}")]
    Read { device: DeviceId, reason: String },
}

/// Provider of raw controller state
///
/// Stick values are signed and range over `-32768..=32767` with Y growing
/// downward. Trigger values range over `0..=32767`.
pub trait DeviceSource: Send {
    /// Drain connect/disconnect events observed since the last call
    fn poll_events(&mut self) -> Vec<DeviceEvent>;

    fn read_stick(&mut self, device: &DeviceId, side: StickSide) -> Result<(i32, i32), SourceError>;

    fn read_trigger(&mut self, device: &DeviceId, side: TriggerSide) -> Result<i32, SourceError>;

    /// Button transitions observed since the previous call for this device
    fn read_button_edges(&mut self, device: &DeviceId) -> Result<Vec<ButtonEdge>, SourceError>;

    /// Read everything the engine needs for one tick in a single pass
    fn read_sample(&mut self, device: &DeviceId) -> Result<DeviceSample, SourceError> {
        let sticks = [
            self.read_stick(device, StickSide::Left)?,
            self.read_stick(device, StickSide::Right)?,
        ];
        let triggers = [
            self.read_trigger(device, TriggerSide::Left)?,
            self.read_trigger(device, TriggerSide::Right)?,
        ];
        let edges = self.read_button_edges(device)?;

        Ok(DeviceSample {
            edges,
            sticks,
            triggers,
        })
    }
}
