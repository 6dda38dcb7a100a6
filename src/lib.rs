//! joycursor - gamepad to mouse/keyboard translation engine
//!
//! Reads raw stick, trigger and button state from connected controllers, resolves
//! it against a per-device JSON mapping and emits cursor, scroll, click and key
//! actions to an input sink.
//!
//! # Architecture
//!
//! ```text
//! DeviceSource ──► PollDriver ──► InputSink
//!                    │    ▲
//!          MappingResolver│
//!                    │    └── EditorCommand (mpsc)
//!              ProfileStore ──► PersistenceWorker
//! ```

pub mod config;
pub mod controller;
pub mod engine;
pub mod mapping;
pub mod output;
pub mod persistence;
