//! Controller subsystem for gamepad input
//!
//! - [`types`] - device identities, sides, buttons and raw samples
//! - [`device_source`] - the [`DeviceSource`] trait the engine polls
//! - [`gilrs_source`] - gilrs backed source for real hardware
//! - [`virtual_pad`] - scripted source driven from code

pub mod device_source;
pub mod gilrs_source;
pub mod types;
pub mod virtual_pad;

pub use device_source::{DeviceEvent, DeviceSource, SourceError};
pub use gilrs_source::GilrsSource;
pub use types::{
    ButtonEdge, ButtonState, ButtonType, Control, DeviceId, DeviceSample, StickSide, TriggerSide,
    AXIS_MAX, DEFAULT_PROFILE,
};
pub use virtual_pad::VirtualPads;
