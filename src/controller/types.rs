use serde::{Deserialize, Serialize};
use std::fmt;

/// Full-scale magnitude of a raw stick or trigger sample
pub const AXIS_MAX: i32 = 32767;

/// Reserved identity holding the template record for new devices
pub const DEFAULT_PROFILE: &str = "default";

/// Stable per-controller identity (vendor GUID) surviving reconnects
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The template identity every unknown device is cloned from
    pub fn default_profile() -> Self {
        Self(DEFAULT_PROFILE.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// Stick side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StickSide {
    Left,
    Right,
}

impl StickSide {
    pub const ALL: [StickSide; 2] = [StickSide::Left, StickSide::Right];

    /// Key of this stick inside a mapping record
    pub fn key(self) -> &'static str {
        match self {
            StickSide::Left => "left_stick",
            StickSide::Right => "right_stick",
        }
    }

    pub fn index(self) -> usize {
        match self {
            StickSide::Left => 0,
            StickSide::Right => 1,
        }
    }
}

// Trigger side
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TriggerSide {
    Left,
    Right,
}

impl TriggerSide {
    pub const ALL: [TriggerSide; 2] = [TriggerSide::Left, TriggerSide::Right];

    /// Key of this trigger inside the `triggers` object of a mapping record
    pub fn key(self) -> &'static str {
        match self {
            TriggerSide::Left => "left_trigger",
            TriggerSide::Right => "right_trigger",
        }
    }

    pub fn index(self) -> usize {
        match self {
            TriggerSide::Left => 0,
            TriggerSide::Right => 1,
        }
    }
}

// Button state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Physical buttons of a standard gamepad layout
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ButtonType {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    Start,
    Back,
    Guide,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    LeftStick,
    RightStick,
}

impl ButtonType {
    /// Buttons that carry an action mapping. Stick clicks are reserved for boost.
    pub const MAPPABLE: [ButtonType; 13] = [
        ButtonType::A,
        ButtonType::B,
        ButtonType::X,
        ButtonType::Y,
        ButtonType::LeftShoulder,
        ButtonType::RightShoulder,
        ButtonType::Start,
        ButtonType::Back,
        ButtonType::Guide,
        ButtonType::DPadUp,
        ButtonType::DPadDown,
        ButtonType::DPadLeft,
        ButtonType::DPadRight,
    ];

    /// Wire name used as key under `buttons` in a mapping record
    pub fn name(self) -> &'static str {
        match self {
            ButtonType::A => "button_a",
            ButtonType::B => "button_b",
            ButtonType::X => "button_x",
            ButtonType::Y => "button_y",
            ButtonType::LeftShoulder => "left_shoulder",
            ButtonType::RightShoulder => "right_shoulder",
            ButtonType::Start => "start",
            ButtonType::Back => "back",
            ButtonType::Guide => "guide",
            ButtonType::DPadUp => "dpad_up",
            ButtonType::DPadDown => "dpad_down",
            ButtonType::DPadLeft => "dpad_left",
            ButtonType::DPadRight => "dpad_right",
            ButtonType::LeftStick => "left_stick_click",
            ButtonType::RightStick => "right_stick_click",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::MAPPABLE
            .into_iter()
            .chain([ButtonType::LeftStick, ButtonType::RightStick])
            .find(|button| button.name() == name)
    }

    /// Stick whose boost flag this button drives (L3/R3)
    pub fn boost_side(self) -> Option<StickSide> {
        match self {
            ButtonType::LeftStick => Some(StickSide::Left),
            ButtonType::RightStick => Some(StickSide::Right),
            _ => None,
        }
    }
}

impl fmt::Display for ButtonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A digital control driven by the action state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Control {
    Button(ButtonType),
    Trigger(TriggerSide),
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Button(button) => f.write_str(button.name()),
            Control::Trigger(side) => f.write_str(side.key()),
        }
    }
}

/// Discrete button transition delivered by a device source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonEdge {
    pub button: ButtonType,
    pub state: ButtonState,
}

impl ButtonEdge {
    pub fn pressed(button: ButtonType) -> Self {
        Self {
            button,
            state: ButtonState::Pressed,
        }
    }

    pub fn released(button: ButtonType) -> Self {
        Self {
            button,
            state: ButtonState::Released,
        }
    }
}

/// Everything read from one device during a single tick
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceSample {
    pub edges: Vec<ButtonEdge>,
    /// Raw (x, y) per stick, indexed by [`StickSide::index`]. Y grows downward.
    pub sticks: [(i32, i32); 2],
    /// Raw trigger values in `0..=AXIS_MAX`, indexed by [`TriggerSide::index`]
    pub triggers: [i32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_names_round_trip() {
        for button in ButtonType::MAPPABLE {
            assert_eq!(ButtonType::from_name(button.name()), Some(button));
        }
        assert_eq!(
            ButtonType::from_name("left_stick_click"),
            Some(ButtonType::LeftStick)
        );
        assert_eq!(ButtonType::from_name("paddle_1"), None);
    }

    #[test]
    fn only_stick_clicks_drive_boost() {
        assert_eq!(ButtonType::LeftStick.boost_side(), Some(StickSide::Left));
        assert_eq!(ButtonType::RightStick.boost_side(), Some(StickSide::Right));
        assert!(ButtonType::MAPPABLE.iter().all(|b| b.boost_side().is_none()));
    }

    #[test]
    fn controls_are_ordered_keys() {
        let held: std::collections::BTreeSet<Control> = [
            Control::Trigger(TriggerSide::Right),
            Control::Button(ButtonType::B),
            Control::Trigger(TriggerSide::Left),
            Control::Button(ButtonType::A),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            held.into_iter().collect::<Vec<_>>(),
            vec![
                Control::Button(ButtonType::A),
                Control::Button(ButtonType::B),
                Control::Trigger(TriggerSide::Left),
                Control::Trigger(TriggerSide::Right),
            ]
        );
    }
}
