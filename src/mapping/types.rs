//! Typed mapping records
//!
//! One record per device identity describes what each stick, trigger and
//! button does. Records are stored as JSON (see [`super::codec`]) and parsed
//! leniently: anything missing or malformed falls back to the defaults below.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::controller::{ButtonType, StickSide, TriggerSide};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Keys an action may press
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Escape,
    Tab,
    Space,
    Alt,
    Ctrl,
    Shift,
    /// Function key F1..=F12
    Function(u8),
}

impl KeyKind {
    pub fn all() -> impl Iterator<Item = KeyKind> {
        [
            KeyKind::Up,
            KeyKind::Down,
            KeyKind::Left,
            KeyKind::Right,
            KeyKind::Enter,
            KeyKind::Escape,
            KeyKind::Tab,
            KeyKind::Space,
            KeyKind::Alt,
            KeyKind::Ctrl,
            KeyKind::Shift,
        ]
        .into_iter()
        .chain((1..=12).map(KeyKind::Function))
    }

    pub fn name(self) -> String {
        let name = match self {
            KeyKind::Up => "up",
            KeyKind::Down => "down",
            KeyKind::Left => "left",
            KeyKind::Right => "right",
            KeyKind::Enter => "enter",
            KeyKind::Escape => "escape",
            KeyKind::Tab => "tab",
            KeyKind::Space => "space",
            KeyKind::Alt => "alt",
            KeyKind::Ctrl => "ctrl",
            KeyKind::Shift => "shift",
            KeyKind::Function(n) => return format!("f{n}"),
        };
        name.to_string()
    }
}

/// A single output a button can produce
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    None,
    Mouse(MouseButton),
    Key(KeyKind),
}

impl Action {
    /// Wire name, e.g. `mouse_left_click` or `keyboard_f5`
    pub fn name(self) -> String {
        match self {
            Action::None => "none".to_string(),
            Action::Mouse(MouseButton::Left) => "mouse_left_click".to_string(),
            Action::Mouse(MouseButton::Right) => "mouse_right_click".to_string(),
            Action::Mouse(MouseButton::Middle) => "mouse_middle_click".to_string(),
            Action::Key(key) => format!("keyboard_{}", key.name()),
        }
    }

    /// Parse a wire name. Unknown names yield `None` so callers can fall back.
    pub fn from_name(name: &str) -> Option<Self> {
        let action = match name {
            "none" => Action::None,
            "mouse_left_click" => Action::Mouse(MouseButton::Left),
            "mouse_right_click" => Action::Mouse(MouseButton::Right),
            "mouse_middle_click" => Action::Mouse(MouseButton::Middle),
            other => {
                let key = other.strip_prefix("keyboard_")?;
                let kind = match key {
                    "up" => KeyKind::Up,
                    "down" => KeyKind::Down,
                    "left" => KeyKind::Left,
                    "right" => KeyKind::Right,
                    "enter" => KeyKind::Enter,
                    "escape" => KeyKind::Escape,
                    "tab" => KeyKind::Tab,
                    "space" => KeyKind::Space,
                    "alt" => KeyKind::Alt,
                    "ctrl" => KeyKind::Ctrl,
                    "shift" => KeyKind::Shift,
                    f => {
                        let n: u8 = f.strip_prefix('f')?.parse().ok()?;
                        if !(1..=12).contains(&n) {
                            return None;
                        }
                        KeyKind::Function(n)
                    }
                };
                Action::Key(kind)
            }
        };
        Some(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

pub const DEFAULT_REPEAT_DELAY_MS: u64 = 500;
pub const DEFAULT_REPEAT_INTERVAL_MS: u64 = 100;

#[derive(Clone, Debug, PartialEq)]
pub struct ButtonAction {
    pub action: Action,
    pub enabled: bool,
    pub repeat_on_hold: bool,
    pub repeat_delay_ms: u64,
    pub repeat_interval_ms: u64,
}

impl ButtonAction {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            enabled: true,
            ..Self::default()
        }
    }

    pub fn repeating(action: Action, delay_ms: u64, interval_ms: u64) -> Self {
        Self {
            action,
            enabled: true,
            repeat_on_hold: true,
            repeat_delay_ms: delay_ms,
            repeat_interval_ms: interval_ms,
        }
    }

    pub fn repeat_delay(&self) -> Duration {
        Duration::from_millis(self.repeat_delay_ms)
    }

    pub fn repeat_interval(&self) -> Duration {
        Duration::from_millis(self.repeat_interval_ms)
    }
}

impl Default for ButtonAction {
    fn default() -> Self {
        Self {
            action: Action::None,
            enabled: false,
            repeat_on_hold: false,
            repeat_delay_ms: DEFAULT_REPEAT_DELAY_MS,
            repeat_interval_ms: DEFAULT_REPEAT_INTERVAL_MS,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ButtonMapping {
    pub enabled: bool,
    pub actions: Vec<ButtonAction>,
}

/// Mapping used for buttons absent from a record
pub static DISABLED_BUTTON: ButtonMapping = ButtonMapping {
    enabled: false,
    actions: Vec::new(),
};

impl ButtonMapping {
    pub fn single(action: Action) -> Self {
        Self {
            enabled: true,
            actions: vec![ButtonAction::new(action)],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StickActionType {
    #[default]
    None,
    Cursor,
    Scroll,
}

impl StickActionType {
    pub fn name(self) -> &'static str {
        match self {
            StickActionType::None => "none",
            StickActionType::Cursor => "cursor",
            StickActionType::Scroll => "scroll",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(StickActionType::None),
            "cursor" => Some(StickActionType::Cursor),
            "scroll" => Some(StickActionType::Scroll),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CursorAction {
    pub sensitivity: f32,
    pub boosted_sensitivity: f32,
    pub smoothing: f32,
}

impl Default for CursorAction {
    fn default() -> Self {
        Self {
            sensitivity: 0.05,
            boosted_sensitivity: 0.3,
            smoothing: 0.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScrollAction {
    pub vertical_sensitivity: f32,
    pub horizontal_sensitivity: f32,
    pub vertical_max_speed: i32,
    pub horizontal_max_speed: i32,
}

impl Default for ScrollAction {
    fn default() -> Self {
        Self {
            vertical_sensitivity: 1.0,
            horizontal_sensitivity: 0.3,
            vertical_max_speed: 40,
            horizontal_max_speed: 15,
        }
    }
}

pub const DEFAULT_STICK_DEADZONE: i32 = 8000;

#[derive(Clone, Debug, PartialEq)]
pub struct StickMapping {
    pub enabled: bool,
    pub action_type: StickActionType,
    pub deadzone: i32,
    pub cursor: CursorAction,
    pub scroll: ScrollAction,
}

impl Default for StickMapping {
    fn default() -> Self {
        Self {
            enabled: false,
            action_type: StickActionType::None,
            deadzone: DEFAULT_STICK_DEADZONE,
            cursor: CursorAction::default(),
            scroll: ScrollAction::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TriggerActionType {
    #[default]
    None,
    Scroll,
    Button,
}

impl TriggerActionType {
    pub fn name(self) -> &'static str {
        match self {
            TriggerActionType::None => "none",
            TriggerActionType::Scroll => "scroll",
            TriggerActionType::Button => "button",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(TriggerActionType::None),
            "scroll" => Some(TriggerActionType::Scroll),
            "button" => Some(TriggerActionType::Button),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn name(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            _ => None,
        }
    }

    /// Sign applied to wheel amounts. Positive scrolls up.
    pub fn sign(self) -> i32 {
        match self {
            ScrollDirection::Up => 1,
            ScrollDirection::Down => -1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TriggerScrollAction {
    pub vertical_sensitivity: f32,
    pub vertical_max_speed: i32,
    pub direction: ScrollDirection,
}

pub const DEFAULT_TRIGGER_THRESHOLD: i32 = 8000;

#[derive(Clone, Debug, PartialEq)]
pub struct TriggerMapping {
    pub enabled: bool,
    pub action_type: TriggerActionType,
    pub threshold: i32,
    pub scroll: TriggerScrollAction,
    pub button: ButtonMapping,
}

impl TriggerMapping {
    /// Defaults differ per side only in scroll direction
    pub fn default_for(side: TriggerSide) -> Self {
        let direction = match side {
            TriggerSide::Left => ScrollDirection::Up,
            TriggerSide::Right => ScrollDirection::Down,
        };
        Self {
            enabled: false,
            action_type: TriggerActionType::None,
            threshold: DEFAULT_TRIGGER_THRESHOLD,
            scroll: TriggerScrollAction {
                vertical_sensitivity: 1.0,
                vertical_max_speed: 40,
                direction,
            },
            button: ButtonMapping::default(),
        }
    }
}

/// Complete mapping for one device identity
#[derive(Clone, Debug, PartialEq)]
pub struct MappingRecord {
    pub name: String,
    pub left_stick: StickMapping,
    pub right_stick: StickMapping,
    pub buttons: BTreeMap<ButtonType, ButtonMapping>,
    pub left_trigger: TriggerMapping,
    pub right_trigger: TriggerMapping,
}

impl Default for MappingRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            left_stick: StickMapping::default(),
            right_stick: StickMapping::default(),
            buttons: BTreeMap::new(),
            left_trigger: TriggerMapping::default_for(TriggerSide::Left),
            right_trigger: TriggerMapping::default_for(TriggerSide::Right),
        }
    }
}

impl MappingRecord {
    pub fn stick(&self, side: StickSide) -> &StickMapping {
        match side {
            StickSide::Left => &self.left_stick,
            StickSide::Right => &self.right_stick,
        }
    }

    pub fn stick_mut(&mut self, side: StickSide) -> &mut StickMapping {
        match side {
            StickSide::Left => &mut self.left_stick,
            StickSide::Right => &mut self.right_stick,
        }
    }

    pub fn trigger(&self, side: TriggerSide) -> &TriggerMapping {
        match side {
            TriggerSide::Left => &self.left_trigger,
            TriggerSide::Right => &self.right_trigger,
        }
    }

    pub fn trigger_mut(&mut self, side: TriggerSide) -> &mut TriggerMapping {
        match side {
            TriggerSide::Left => &mut self.left_trigger,
            TriggerSide::Right => &mut self.right_trigger,
        }
    }

    /// Buttons missing from the record are disabled
    pub fn button(&self, button: ButtonType) -> &ButtonMapping {
        self.buttons.get(&button).unwrap_or(&DISABLED_BUTTON)
    }

    /// One-line summary for connection logs
    pub fn summary(&self) -> String {
        let stick = |m: &StickMapping| {
            if m.enabled {
                m.action_type.name()
            } else {
                "off"
            }
        };
        let buttons: Vec<String> = self
            .buttons
            .iter()
            .filter(|(_, mapping)| mapping.enabled)
            .map(|(button, mapping)| {
                let actions: Vec<String> = mapping
                    .actions
                    .iter()
                    .filter(|a| a.enabled)
                    .map(|a| a.action.name())
                    .collect();
                format!("{}={}", button, actions.join("+"))
            })
            .collect();
        format!(
            "'{}' left_stick={} right_stick={} buttons=[{}]",
            self.name,
            stick(&self.left_stick),
            stick(&self.right_stick),
            buttons.join(", ")
        )
    }
}
