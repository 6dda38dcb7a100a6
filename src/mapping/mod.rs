//! Per-device mapping records
//!
//! A mapping record says what each stick, trigger and button of one controller
//! produces. Records live in the profile store as JSON, are decoded leniently by
//! [`codec`] and cached by the [`MappingResolver`].

pub mod codec;
pub mod error;
pub mod resolver;
pub mod types;

pub use error::MappingError;
pub use resolver::MappingResolver;
pub use types::{
    Action, ButtonAction, ButtonMapping, CursorAction, KeyKind, MappingRecord, MouseButton,
    ScrollAction, ScrollDirection, StickActionType, StickMapping, TriggerActionType,
    TriggerMapping, TriggerScrollAction,
};
