//! Input sinks
//!
//! The engine produces [`OutputAction`]s; an [`InputSink`] turns them into OS
//! input. Sinks:
//!
//! - [`uinput::UinputSink`] - virtual mouse/keyboard through Linux uinput
//! - [`TracingSink`] - logs every action (dry run)
//! - [`RecordingSink`] - keeps actions in memory for inspection

#[cfg(target_os = "linux")]
pub mod uinput;

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use crate::mapping::{KeyKind, MouseButton};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to create virtual input device: {0}")]
    CreateDevice(#[source] std::io::Error),

    #[error("Failed to emit input event: {0}")]
    Emit(#[source] std::io::Error),

    #[error("Input sink unavailable: {0}")]
    Unavailable(String),
}

/// Platform input injection
///
/// Cursor deltas are in pixels and may be fractional. Scroll amounts use wheel
/// units where 120 is one notch; positive vertical scrolls up, positive
/// horizontal scrolls right.
pub trait InputSink: Send {
    fn move_cursor(&mut self, dx: f32, dy: f32) -> Result<(), SinkError>;
    fn scroll_vertical(&mut self, amount: i32) -> Result<(), SinkError>;
    fn scroll_horizontal(&mut self, amount: i32) -> Result<(), SinkError>;
    fn mouse_down(&mut self, button: MouseButton) -> Result<(), SinkError>;
    fn mouse_up(&mut self, button: MouseButton) -> Result<(), SinkError>;
    fn key_down(&mut self, key: KeyKind) -> Result<(), SinkError>;
    fn key_up(&mut self, key: KeyKind) -> Result<(), SinkError>;
}

/// One call on an [`InputSink`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputAction {
    MoveCursor { dx: f32, dy: f32 },
    ScrollVertical(i32),
    ScrollHorizontal(i32),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    KeyDown(KeyKind),
    KeyUp(KeyKind),
}

impl OutputAction {
    pub fn apply(self, sink: &mut dyn InputSink) -> Result<(), SinkError> {
        match self {
            OutputAction::MoveCursor { dx, dy } => sink.move_cursor(dx, dy),
            OutputAction::ScrollVertical(amount) => sink.scroll_vertical(amount),
            OutputAction::ScrollHorizontal(amount) => sink.scroll_horizontal(amount),
            OutputAction::MouseDown(button) => sink.mouse_down(button),
            OutputAction::MouseUp(button) => sink.mouse_up(button),
            OutputAction::KeyDown(key) => sink.key_down(key),
            OutputAction::KeyUp(key) => sink.key_up(key),
        }
    }

    /// True for actions that leave something held down
    pub fn is_down(&self) -> bool {
        matches!(self, OutputAction::MouseDown(_) | OutputAction::KeyDown(_))
    }
}

/// Dry-run sink that logs instead of injecting
#[derive(Debug, Default)]
pub struct TracingSink;

impl InputSink for TracingSink {
    fn move_cursor(&mut self, dx: f32, dy: f32) -> Result<(), SinkError> {
        info!("cursor dx={:.2} dy={:.2}", dx, dy);
        Ok(())
    }

    fn scroll_vertical(&mut self, amount: i32) -> Result<(), SinkError> {
        info!("scroll vertical {}", amount);
        Ok(())
    }

    fn scroll_horizontal(&mut self, amount: i32) -> Result<(), SinkError> {
        info!("scroll horizontal {}", amount);
        Ok(())
    }

    fn mouse_down(&mut self, button: MouseButton) -> Result<(), SinkError> {
        info!("mouse {:?} down", button);
        Ok(())
    }

    fn mouse_up(&mut self, button: MouseButton) -> Result<(), SinkError> {
        info!("mouse {:?} up", button);
        Ok(())
    }

    fn key_down(&mut self, key: KeyKind) -> Result<(), SinkError> {
        info!("key {} down", key.name());
        Ok(())
    }

    fn key_up(&mut self, key: KeyKind) -> Result<(), SinkError> {
        info!("key {} up", key.name());
        Ok(())
    }
}

/// Sink that stores every action. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<OutputAction>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutputAction>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, action: OutputAction) -> Result<(), SinkError> {
        self.lock().push(action);
        Ok(())
    }

    /// Take everything recorded so far
    pub fn drain(&self) -> Vec<OutputAction> {
        std::mem::take(&mut *self.lock())
    }

    pub fn actions(&self) -> Vec<OutputAction> {
        self.lock().clone()
    }
}

impl InputSink for RecordingSink {
    fn move_cursor(&mut self, dx: f32, dy: f32) -> Result<(), SinkError> {
        self.push(OutputAction::MoveCursor { dx, dy })
    }

    fn scroll_vertical(&mut self, amount: i32) -> Result<(), SinkError> {
        self.push(OutputAction::ScrollVertical(amount))
    }

    fn scroll_horizontal(&mut self, amount: i32) -> Result<(), SinkError> {
        self.push(OutputAction::ScrollHorizontal(amount))
    }

    fn mouse_down(&mut self, button: MouseButton) -> Result<(), SinkError> {
        self.push(OutputAction::MouseDown(button))
    }

    fn mouse_up(&mut self, button: MouseButton) -> Result<(), SinkError> {
        self.push(OutputAction::MouseUp(button))
    }

    fn key_down(&mut self, key: KeyKind) -> Result<(), SinkError> {
        self.push(OutputAction::KeyDown(key))
    }

    fn key_up(&mut self, key: KeyKind) -> Result<(), SinkError> {
        self.push(OutputAction::KeyUp(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_routes_to_sink() {
        let recorder = RecordingSink::new();
        let mut sink = recorder.clone();
        let actions = [
            OutputAction::MouseDown(MouseButton::Left),
            OutputAction::ScrollVertical(-12),
            OutputAction::KeyUp(KeyKind::Function(4)),
        ];
        for action in actions {
            action.apply(&mut sink).unwrap();
        }
        assert_eq!(recorder.drain(), actions.to_vec());
        assert!(recorder.actions().is_empty());
    }
}
