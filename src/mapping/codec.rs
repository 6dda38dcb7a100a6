//! JSON encoding of mapping records
//!
//! Decoding never fails. Each field is read on its own and replaced by its
//! default when missing or of the wrong type, so a hand-edited file with one
//! typo still yields a usable mapping.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use tracing::warn;

use super::types::{
    Action, ButtonAction, ButtonMapping, CursorAction, MappingRecord, ScrollAction,
    ScrollDirection, StickActionType, StickMapping, TriggerActionType, TriggerMapping,
    TriggerScrollAction,
};
use crate::controller::{ButtonType, StickSide, TriggerSide};

fn read_bool(value: &Value, key: &str, default: bool) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn read_i32(value: &Value, key: &str, default: i32) -> i32 {
    value
        .get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(default)
}

fn read_u64(value: &Value, key: &str, default: u64) -> u64 {
    value
        .get(key)
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)))
        .unwrap_or(default)
}

fn read_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn read_named<T>(value: &Value, key: &str, parse: impl Fn(&str) -> Option<T>, default: T) -> T {
    match read_str(value, key) {
        Some(name) => parse(name).unwrap_or_else(|| {
            warn!("Unknown value '{}' for '{}', using default", name, key);
            default
        }),
        None => default,
    }
}

/// A field that decodes to `None` instead of failing when its JSON has the wrong type
struct Lenient<T>(Option<T>);

impl<T> Default for Lenient<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> Lenient<T> {
    fn or(self, default: T) -> T {
        self.0.unwrap_or(default)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self(serde_json::from_value(value).ok()))
    }
}

/// Decode a nested settings object; anything that is not an object yields all defaults
fn decode_fields<T: DeserializeOwned + Default>(value: Option<&Value>) -> T {
    value
        .filter(|v| v.is_object())
        .and_then(|v| T::deserialize(v).ok())
        .unwrap_or_default()
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CursorFields {
    sensitivity: Lenient<f32>,
    boosted_sensitivity: Lenient<f32>,
    smoothing: Lenient<f32>,
}

impl CursorFields {
    fn over(self, defaults: CursorAction) -> CursorAction {
        CursorAction {
            sensitivity: self.sensitivity.or(defaults.sensitivity),
            boosted_sensitivity: self.boosted_sensitivity.or(defaults.boosted_sensitivity),
            smoothing: self.smoothing.or(defaults.smoothing),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ScrollFields {
    vertical_sensitivity: Lenient<f32>,
    horizontal_sensitivity: Lenient<f32>,
    vertical_max_speed: Lenient<i32>,
    horizontal_max_speed: Lenient<i32>,
}

impl ScrollFields {
    fn over(self, defaults: ScrollAction) -> ScrollAction {
        ScrollAction {
            vertical_sensitivity: self.vertical_sensitivity.or(defaults.vertical_sensitivity),
            horizontal_sensitivity: self
                .horizontal_sensitivity
                .or(defaults.horizontal_sensitivity),
            vertical_max_speed: self.vertical_max_speed.or(defaults.vertical_max_speed),
            horizontal_max_speed: self.horizontal_max_speed.or(defaults.horizontal_max_speed),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TriggerScrollFields {
    vertical_sensitivity: Lenient<f32>,
    vertical_max_speed: Lenient<i32>,
}

impl ButtonAction {
    pub fn from_json(value: &Value) -> Self {
        let defaults = ButtonAction::default();
        Self {
            action: read_named(value, "action_type", Action::from_name, Action::None),
            enabled: read_bool(value, "enabled", defaults.enabled),
            repeat_on_hold: read_bool(value, "repeat_on_hold", defaults.repeat_on_hold),
            repeat_delay_ms: read_u64(value, "repeat_delay", defaults.repeat_delay_ms),
            repeat_interval_ms: read_u64(value, "repeat_interval", defaults.repeat_interval_ms),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "action_type": self.action.name(),
            "enabled": self.enabled,
            "repeat_on_hold": self.repeat_on_hold,
            "repeat_delay": self.repeat_delay_ms,
            "repeat_interval": self.repeat_interval_ms,
        })
    }
}

impl ButtonMapping {
    pub fn from_json(value: &Value) -> Self {
        let actions = value
            .get("actions")
            .and_then(Value::as_array)
            .map(|list| list.iter().map(ButtonAction::from_json).collect())
            .unwrap_or_default();
        Self {
            enabled: read_bool(value, "enabled", false),
            actions,
        }
    }

    pub fn to_json(&self) -> Value {
        let actions: Vec<Value> = self.actions.iter().map(ButtonAction::to_json).collect();
        json!({
            "enabled": self.enabled,
            "actions": actions,
        })
    }
}

impl StickMapping {
    pub fn from_json(value: &Value) -> Self {
        let defaults = StickMapping::default();
        let cursor: CursorFields = decode_fields(value.get("cursor_action"));
        let scroll: ScrollFields = decode_fields(value.get("scroll_action"));
        Self {
            enabled: read_bool(value, "enabled", defaults.enabled),
            action_type: read_named(
                value,
                "action_type",
                StickActionType::from_name,
                defaults.action_type,
            ),
            deadzone: read_i32(value, "deadzone", defaults.deadzone),
            cursor: cursor.over(defaults.cursor),
            scroll: scroll.over(defaults.scroll),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "enabled": self.enabled,
            "action_type": self.action_type.name(),
            "deadzone": self.deadzone,
            "cursor_action": self.cursor,
            "scroll_action": self.scroll,
        })
    }
}

impl TriggerMapping {
    pub fn from_json(value: &Value, side: TriggerSide) -> Self {
        let defaults = TriggerMapping::default_for(side);
        let scroll: TriggerScrollFields = decode_fields(value.get("trigger_scroll_action"));
        Self {
            enabled: read_bool(value, "enabled", defaults.enabled),
            action_type: read_named(
                value,
                "action_type",
                TriggerActionType::from_name,
                defaults.action_type,
            ),
            threshold: read_i32(value, "threshold", defaults.threshold),
            scroll: TriggerScrollAction {
                vertical_sensitivity: scroll
                    .vertical_sensitivity
                    .or(defaults.scroll.vertical_sensitivity),
                vertical_max_speed: scroll.vertical_max_speed.or(defaults.scroll.vertical_max_speed),
                direction: read_named(
                    value,
                    "scroll_direction",
                    ScrollDirection::from_name,
                    defaults.scroll.direction,
                ),
            },
            button: value
                .get("button_action")
                .map(ButtonMapping::from_json)
                .unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "enabled": self.enabled,
            "action_type": self.action_type.name(),
            "threshold": self.threshold,
            "scroll_direction": self.scroll.direction.name(),
            "trigger_scroll_action": {
                "vertical_sensitivity": self.scroll.vertical_sensitivity,
                "vertical_max_speed": self.scroll.vertical_max_speed,
            },
            "button_action": self.button.to_json(),
        })
    }
}

impl MappingRecord {
    pub fn from_json(value: &Value) -> Self {
        let buttons_value = value.get("buttons").unwrap_or(&Value::Null);
        let buttons = ButtonType::MAPPABLE
            .into_iter()
            .filter_map(|button| {
                buttons_value
                    .get(button.name())
                    .map(|v| (button, ButtonMapping::from_json(v)))
            })
            .collect();
        let triggers = value.get("triggers").unwrap_or(&Value::Null);
        let stick = |side: StickSide| {
            value
                .get(side.key())
                .map(StickMapping::from_json)
                .unwrap_or_default()
        };
        let trigger = |side: TriggerSide| {
            TriggerMapping::from_json(triggers.get(side.key()).unwrap_or(&Value::Null), side)
        };

        Self {
            name: read_str(value, "name").unwrap_or_default().to_string(),
            left_stick: stick(StickSide::Left),
            right_stick: stick(StickSide::Right),
            buttons,
            left_trigger: trigger(TriggerSide::Left),
            right_trigger: trigger(TriggerSide::Right),
        }
    }

    pub fn to_json(&self) -> Value {
        let buttons: Map<String, Value> = self
            .buttons
            .iter()
            .map(|(button, mapping)| (button.name().to_string(), mapping.to_json()))
            .collect();
        json!({
            "name": self.name,
            "left_stick": self.left_stick.to_json(),
            "right_stick": self.right_stick.to_json(),
            "buttons": buttons,
            "triggers": {
                "left_trigger": self.left_trigger.to_json(),
                "right_trigger": self.right_trigger.to_json(),
            },
        })
    }

    /// Overlay `overrides` onto a copy of `default` and decode the result
    pub fn from_default(default: &Value, overrides: &Value) -> Self {
        let mut merged = default.clone();
        merge_json(&mut merged, overrides);
        Self::from_json(&merged)
    }
}

/// Deep-merge `overrides` into `base`. Objects merge key by key, anything else replaces.
pub fn merge_json(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

pub fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

/// Mutable access to `value[key]` as an object, replacing whatever was there if needed
pub fn object_entry<'a>(value: &'a mut Value, key: &str) -> &'a mut Map<String, Value> {
    let entry = ensure_object(value)
        .entry(key.to_string())
        .or_insert(Value::Null);
    ensure_object(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::types::{KeyKind, MouseButton};

    #[test]
    fn test_malformed_fields_fall_back_to_defaults() {
        let value = json!({
            "enabled": "yes",
            "action_type": "teleport",
            "deadzone": "big",
            "cursor_action": { "sensitivity": 0.1, "smoothing": [] },
            "scroll_action": 7,
        });
        let stick = StickMapping::from_json(&value);
        let defaults = StickMapping::default();

        assert!(!stick.enabled);
        assert_eq!(stick.action_type, StickActionType::None);
        assert_eq!(stick.deadzone, defaults.deadzone);
        assert_eq!(stick.cursor.sensitivity, 0.1);
        assert_eq!(stick.cursor.smoothing, defaults.cursor.smoothing);
        assert_eq!(stick.scroll, defaults.scroll);
    }

    #[test]
    fn test_button_mapping_decodes_actions() {
        let value = json!({
            "enabled": true,
            "actions": [
                { "action_type": "mouse_left_click" },
                { "action_type": "keyboard_down", "repeat_on_hold": true, "repeat_delay": 300 },
                { "action_type": "keyboard_teleport" },
            ],
        });
        let mapping = ButtonMapping::from_json(&value);

        assert!(mapping.enabled);
        assert_eq!(mapping.actions.len(), 3);
        assert_eq!(mapping.actions[0].action, Action::Mouse(MouseButton::Left));
        // Actions without an explicit flag stay off
        assert!(!mapping.actions[0].enabled);
        assert_eq!(mapping.actions[1].action, Action::Key(KeyKind::Down));
        assert_eq!(mapping.actions[1].repeat_delay_ms, 300);
        assert_eq!(mapping.actions[1].repeat_interval_ms, 100);
        assert_eq!(mapping.actions[2].action, Action::None);
    }

    #[test]
    fn test_button_action_enabled_only_when_set() {
        let value = json!({
            "enabled": true,
            "actions": [
                { "action_type": "mouse_right_click", "enabled": true },
                { "action_type": "keyboard_enter", "enabled": "true" },
            ],
        });
        let mapping = ButtonMapping::from_json(&value);

        assert!(mapping.actions[0].enabled);
        assert!(!mapping.actions[1].enabled);
        assert!(!ButtonAction::default().enabled);
        assert!(ButtonAction::new(Action::Key(KeyKind::Enter)).enabled);
    }

    #[test]
    fn test_nested_settings_fall_back_per_field() {
        let value = json!({
            "enabled": true,
            "action_type": "scroll",
            "scroll_action": {
                "vertical_sensitivity": 2,
                "horizontal_sensitivity": "fast",
                "vertical_max_speed": 30,
                "horizontal_max_speed": null,
            },
        });
        let stick = StickMapping::from_json(&value);
        let defaults = ScrollAction::default();

        assert_eq!(stick.scroll.vertical_sensitivity, 2.0);
        assert_eq!(stick.scroll.horizontal_sensitivity, defaults.horizontal_sensitivity);
        assert_eq!(stick.scroll.vertical_max_speed, 30);
        assert_eq!(stick.scroll.horizontal_max_speed, defaults.horizontal_max_speed);

        let trigger = TriggerMapping::from_json(
            &json!({ "trigger_scroll_action": { "vertical_max_speed": "max" } }),
            TriggerSide::Left,
        );
        assert_eq!(trigger.scroll, TriggerMapping::default_for(TriggerSide::Left).scroll);
    }

    #[test]
    fn test_trigger_decode_uses_side_defaults() {
        let value = json!({ "enabled": true, "action_type": "scroll" });
        let right = TriggerMapping::from_json(&value, TriggerSide::Right);
        assert_eq!(right.scroll.direction, ScrollDirection::Down);
        assert_eq!(right.threshold, 8000);
        assert_eq!(right.action_type, TriggerActionType::Scroll);
    }

    #[test]
    fn test_record_encode_decode_keeps_content() {
        let mut record = MappingRecord {
            name: "Pad".to_string(),
            ..MappingRecord::default()
        };
        record.left_stick.enabled = true;
        record.left_stick.action_type = StickActionType::Cursor;
        record
            .buttons
            .insert(ButtonType::B, ButtonMapping::single(Action::Key(KeyKind::Escape)));
        record.right_trigger.action_type = TriggerActionType::Button;
        record.right_trigger.button = ButtonMapping::single(Action::Mouse(MouseButton::Right));

        assert_eq!(MappingRecord::from_json(&record.to_json()), record);
    }

    #[test]
    fn test_merge_overrides_nested_keys() {
        let mut base = json!({ "a": { "x": 1, "y": 2 }, "b": 3 });
        merge_json(&mut base, &json!({ "a": { "y": 5 }, "c": 4 }));
        assert_eq!(base, json!({ "a": { "x": 1, "y": 5 }, "b": 3, "c": 4 }));
    }

    #[test]
    fn test_object_entry_repairs_non_objects() {
        let mut value = json!({ "buttons": 12 });
        object_entry(&mut value, "buttons").insert("button_a".into(), json!({}));
        assert_eq!(value, json!({ "buttons": { "button_a": {} } }));
    }
}
