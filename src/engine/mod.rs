//! Translation engine
//!
//! Turns raw controller samples into mouse and keyboard actions.
//!
//! - [`analog`] - cursor and scroll math for sticks and triggers
//! - [`digital`] - press/repeat/release state machine for buttons
//! - [`session`] - per-device state carried between ticks
//! - [`driver`] - the poll loop owning sessions, mappings and the sink
//! - [`handle`] - task handle and async editor API

pub mod analog;
pub mod digital;
pub mod driver;
pub mod error;
pub mod handle;
pub mod session;
pub mod timing;

pub use driver::{DriverSettings, DriverState, Idle, PollDriver, Running, Stopped};
pub use error::EngineError;
pub use handle::{EditorClient, EditorCommand, EngineHandle};
pub use session::SessionState;
