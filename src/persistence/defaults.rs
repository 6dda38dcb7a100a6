//! Built-in default profile
//!
//! Used when `mappings.json` does not exist yet. The left stick drives the
//! cursor, the right stick and both triggers scroll, and the face buttons,
//! shoulders and d-pad cover clicks and navigation keys.

use serde_json::{json, Value};

fn single(action: &str) -> Value {
    json!({
        "enabled": true,
        "actions": [ { "action_type": action, "enabled": true, "repeat_on_hold": false } ],
    })
}

fn repeating(action: &str) -> Value {
    json!({
        "enabled": true,
        "actions": [ {
            "action_type": action,
            "enabled": true,
            "repeat_on_hold": true,
            "repeat_delay": 500,
            "repeat_interval": 100,
        } ],
    })
}

fn disabled() -> Value {
    json!({
        "enabled": false,
        "actions": [ { "action_type": "none", "enabled": false } ],
    })
}

fn stick(action_type: &str, sensitivity: f64, boosted: f64) -> Value {
    json!({
        "enabled": true,
        "action_type": action_type,
        "deadzone": 8000,
        "cursor_action": {
            "sensitivity": sensitivity,
            "boosted_sensitivity": boosted,
            "smoothing": 0.2,
        },
        "scroll_action": {
            "vertical_sensitivity": 1.0,
            "horizontal_sensitivity": 0.5,
            "vertical_max_speed": 20,
            "horizontal_max_speed": 10,
        },
    })
}

fn scroll_trigger(direction: &str) -> Value {
    json!({
        "enabled": true,
        "action_type": "scroll",
        "threshold": 8000,
        "scroll_direction": direction,
        "button_action": disabled(),
        "trigger_scroll_action": {
            "vertical_sensitivity": 1.0,
            "vertical_max_speed": 40,
        },
    })
}

/// The object stored under `mappings`, holding only the `default` record
pub fn fallback_mappings() -> Value {
    json!({
        "default": {
            "name": "Default Profile",
            "left_stick": stick("cursor", 0.05, 0.3),
            "right_stick": stick("scroll", 0.3, 0.05),
            "buttons": {
                "button_a": single("mouse_left_click"),
                "button_b": single("keyboard_escape"),
                "button_x": single("keyboard_enter"),
                "button_y": disabled(),
                "left_shoulder": disabled(),
                "right_shoulder": single("mouse_right_click"),
                "start": single("keyboard_tab"),
                "back": single("keyboard_alt"),
                "guide": disabled(),
                "dpad_up": repeating("keyboard_up"),
                "dpad_down": repeating("keyboard_down"),
                "dpad_left": repeating("keyboard_left"),
                "dpad_right": repeating("keyboard_right"),
            },
            "triggers": {
                "left_trigger": scroll_trigger("up"),
                "right_trigger": scroll_trigger("down"),
            },
        }
    })
}
