//! Virtual mouse and keyboard using evdev/uinput
//!
//! Creates one device exposing relative pointer axes, both wheels (with
//! high-resolution variants) and the keys actions may press.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, EventType, InputEvent, Key, RelativeAxisType,
};
use tracing::info;

use super::{InputSink, SinkError};
use crate::mapping::{KeyKind, MouseButton};

/// Wheel units per physical notch
pub const WHEEL_NOTCH: i32 = 120;

pub const DEVICE_NAME: &str = "joycursor virtual input";

pub struct UinputSink {
    device: VirtualDevice,
    /// Sub-pixel cursor movement carried to the next event
    remainder: (f32, f32),
    /// Wheel units not yet worth a full low-resolution notch
    wheel_remainder: (i32, i32),
}

impl UinputSink {
    pub fn new(name: &str) -> Result<Self, SinkError> {
        let mut keys = AttributeSet::<Key>::new();
        keys.insert(Key::BTN_LEFT);
        keys.insert(Key::BTN_RIGHT);
        keys.insert(Key::BTN_MIDDLE);
        for kind in KeyKind::all() {
            keys.insert(key_code(kind));
        }

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        for axis in [
            RelativeAxisType::REL_X,
            RelativeAxisType::REL_Y,
            RelativeAxisType::REL_WHEEL,
            RelativeAxisType::REL_HWHEEL,
            RelativeAxisType::REL_WHEEL_HI_RES,
            RelativeAxisType::REL_HWHEEL_HI_RES,
        ] {
            axes.insert(axis);
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(SinkError::CreateDevice)?
            .name(name)
            .with_keys(&keys)
            .map_err(SinkError::CreateDevice)?
            .with_relative_axes(&axes)
            .map_err(SinkError::CreateDevice)?
            .build()
            .map_err(SinkError::CreateDevice)?;

        info!("Created uinput device '{}'", name);
        Ok(Self {
            device,
            remainder: (0.0, 0.0),
            wheel_remainder: (0, 0),
        })
    }

    fn emit(&mut self, events: &[InputEvent]) -> Result<(), SinkError> {
        if events.is_empty() {
            return Ok(());
        }
        self.device.emit(events).map_err(SinkError::Emit)
    }

    fn key(&mut self, code: Key, value: i32) -> Result<(), SinkError> {
        self.emit(&[InputEvent::new_now(EventType::KEY, code.code(), value)])
    }

    fn wheel(
        &mut self,
        amount: i32,
        hi_res: RelativeAxisType,
        low_res: RelativeAxisType,
        carried: i32,
    ) -> Result<i32, SinkError> {
        let total = carried + amount;
        let notches = total / WHEEL_NOTCH;
        let mut events = vec![InputEvent::new_now(EventType::RELATIVE, hi_res.0, amount)];
        if notches != 0 {
            events.push(InputEvent::new_now(EventType::RELATIVE, low_res.0, notches));
        }
        self.emit(&events)?;
        Ok(total - notches * WHEEL_NOTCH)
    }
}

impl InputSink for UinputSink {
    fn move_cursor(&mut self, dx: f32, dy: f32) -> Result<(), SinkError> {
        let (x, rx) = split_whole(self.remainder.0 + dx);
        let (y, ry) = split_whole(self.remainder.1 + dy);
        self.remainder = (rx, ry);

        let mut events = Vec::with_capacity(2);
        if x != 0 {
            events.push(InputEvent::new_now(EventType::RELATIVE, RelativeAxisType::REL_X.0, x));
        }
        if y != 0 {
            events.push(InputEvent::new_now(EventType::RELATIVE, RelativeAxisType::REL_Y.0, y));
        }
        self.emit(&events)
    }

    fn scroll_vertical(&mut self, amount: i32) -> Result<(), SinkError> {
        let carried = self.wheel_remainder.0;
        self.wheel_remainder.0 = self.wheel(
            amount,
            RelativeAxisType::REL_WHEEL_HI_RES,
            RelativeAxisType::REL_WHEEL,
            carried,
        )?;
        Ok(())
    }

    fn scroll_horizontal(&mut self, amount: i32) -> Result<(), SinkError> {
        let carried = self.wheel_remainder.1;
        self.wheel_remainder.1 = self.wheel(
            amount,
            RelativeAxisType::REL_HWHEEL_HI_RES,
            RelativeAxisType::REL_HWHEEL,
            carried,
        )?;
        Ok(())
    }

    fn mouse_down(&mut self, button: MouseButton) -> Result<(), SinkError> {
        self.key(button_code(button), 1)
    }

    fn mouse_up(&mut self, button: MouseButton) -> Result<(), SinkError> {
        self.key(button_code(button), 0)
    }

    fn key_down(&mut self, key: KeyKind) -> Result<(), SinkError> {
        self.key(key_code(key), 1)
    }

    fn key_up(&mut self, key: KeyKind) -> Result<(), SinkError> {
        self.key(key_code(key), 0)
    }
}

/// Whole pixels to emit now and the fraction to carry
fn split_whole(value: f32) -> (i32, f32) {
    let whole = value.trunc();
    (whole as i32, value - whole)
}

fn button_code(button: MouseButton) -> Key {
    match button {
        MouseButton::Left => Key::BTN_LEFT,
        MouseButton::Right => Key::BTN_RIGHT,
        MouseButton::Middle => Key::BTN_MIDDLE,
    }
}

fn key_code(key: KeyKind) -> Key {
    match key {
        KeyKind::Up => Key::KEY_UP,
        KeyKind::Down => Key::KEY_DOWN,
        KeyKind::Left => Key::KEY_LEFT,
        KeyKind::Right => Key::KEY_RIGHT,
        KeyKind::Enter => Key::KEY_ENTER,
        KeyKind::Escape => Key::KEY_ESC,
        KeyKind::Tab => Key::KEY_TAB,
        KeyKind::Space => Key::KEY_SPACE,
        KeyKind::Alt => Key::KEY_LEFTALT,
        KeyKind::Ctrl => Key::KEY_LEFTCTRL,
        KeyKind::Shift => Key::KEY_LEFTSHIFT,
        KeyKind::Function(n) => match n {
            1 => Key::KEY_F1,
            2 => Key::KEY_F2,
            3 => Key::KEY_F3,
            4 => Key::KEY_F4,
            5 => Key::KEY_F5,
            6 => Key::KEY_F6,
            7 => Key::KEY_F7,
            8 => Key::KEY_F8,
            9 => Key::KEY_F9,
            10 => Key::KEY_F10,
            11 => Key::KEY_F11,
            _ => Key::KEY_F12,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_whole_carries_fraction() {
        let (whole, rest) = split_whole(3.75);
        assert_eq!(whole, 3);
        assert!((rest - 0.75).abs() < 1e-6);

        let (whole, rest) = split_whole(-1.5);
        assert_eq!(whole, -1);
        assert!((rest + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_function_keys_are_distinct() {
        let codes: std::collections::HashSet<u16> =
            (1..=12).map(|n| key_code(KeyKind::Function(n)).code()).collect();
        assert_eq!(codes.len(), 12);
    }

    #[test]
    #[ignore] // Requires uinput access (run with: cargo test -- --ignored)
    fn test_create_uinput_sink() {
        assert!(UinputSink::new("joycursor test").is_ok());
    }
}
