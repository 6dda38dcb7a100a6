//! End-to-end scenarios through the poll driver with scripted input

use std::time::{Duration, Instant};

use joycursor::controller::{ButtonEdge, ButtonType, DeviceId, StickSide, TriggerSide, VirtualPads, AXIS_MAX};
use joycursor::engine::{DriverSettings, PollDriver, Running};
use joycursor::engine::analog::Velocity;
use joycursor::mapping::{
    Action, ButtonMapping, KeyKind, MappingError, MouseButton, StickActionType, TriggerActionType,
};
use joycursor::output::{OutputAction, RecordingSink};
use joycursor::persistence::{MemoryProfileStore, ProfileStore};
use serde_json::json;

struct Rig {
    pads: VirtualPads,
    sink: RecordingSink,
    driver: PollDriver<Running>,
    start: Instant,
}

impl Rig {
    fn new(store: MemoryProfileStore) -> Self {
        let pads = VirtualPads::new();
        let sink = RecordingSink::new();
        let driver = PollDriver::create(
            Box::new(pads.clone()),
            Box::new(sink.clone()),
            Box::new(store),
            DriverSettings::default(),
        )
        .start();
        Self {
            pads,
            sink,
            driver,
            start: Instant::now(),
        }
    }

    fn tick_at(&mut self, ms: u64) -> Vec<OutputAction> {
        self.driver.tick(self.start + Duration::from_millis(ms));
        self.sink.drain()
    }
}

fn pad() -> DeviceId {
    DeviceId::from("030000005e0400008e02000014010000")
}

fn cursor_only_default() -> MemoryProfileStore {
    MemoryProfileStore::from_mappings(json!({
        "default": {
            "left_stick": {
                "enabled": true,
                "action_type": "cursor",
                "deadzone": 8000,
                "cursor_action": { "sensitivity": 0.05, "boosted_sensitivity": 0.3, "smoothing": 1.0 },
            },
        }
    }))
}

#[test]
fn test_cursor_reference_scenario() {
    let mut rig = Rig::new(cursor_only_default());
    rig.pads.connect(&pad(), "Xbox Controller");
    rig.pads.set_stick(&pad(), StickSide::Left, 20000, 0);
    rig.tick_at(0);

    rig.driver.tick(rig.start + Duration::from_micros(16_667));
    let actions = rig.sink.drain();

    assert_eq!(actions.len(), 1);
    match actions[0] {
        OutputAction::MoveCursor { dx, dy } => {
            assert!((dx - 3.05).abs() < 0.01, "dx {}", dx);
            assert_eq!(dy, 0.0);
        }
        other => panic!("expected cursor motion, got {:?}", other),
    }
}

#[test]
fn test_boost_while_stick_click_held() {
    let mut rig = Rig::new(cursor_only_default());
    rig.pads.connect(&pad(), "Xbox Controller");
    rig.pads.set_stick(&pad(), StickSide::Left, AXIS_MAX, 0);
    rig.tick_at(0);

    let normal = rig.tick_at(10);
    rig.pads.push_edge(&pad(), ButtonEdge::pressed(ButtonType::LeftStick));
    let boosted = rig.tick_at(20);

    let dx = |actions: &[OutputAction]| match actions {
        [OutputAction::MoveCursor { dx, .. }] => *dx,
        other => panic!("expected one cursor motion, got {:?}", other),
    };
    // 0.3 / 0.05
    assert!((dx(&boosted) / dx(&normal) - 6.0).abs() < 0.01);

    rig.pads.push_edge(&pad(), ButtonEdge::released(ButtonType::LeftStick));
    let released = rig.tick_at(30);
    assert!((dx(&released) - dx(&normal)).abs() < 0.01);
}

#[test]
fn test_dpad_repeats_after_delay() {
    let mut rig = Rig::new(MemoryProfileStore::with_fallback_default());
    rig.pads.connect(&pad(), "Xbox Controller");
    rig.tick_at(0);

    rig.pads.push_edge(&pad(), ButtonEdge::pressed(ButtonType::DPadDown));
    assert_eq!(rig.tick_at(5), vec![OutputAction::KeyDown(KeyKind::Down)]);

    let mut taps = Vec::new();
    for ms in (10..=805).step_by(5) {
        let actions = rig.tick_at(ms);
        if !actions.is_empty() {
            assert_eq!(
                actions,
                vec![OutputAction::KeyDown(KeyKind::Down), OutputAction::KeyUp(KeyKind::Down)]
            );
            taps.push(ms);
        }
    }
    assert_eq!(taps, vec![505, 605, 705, 805]);

    rig.pads.push_edge(&pad(), ButtonEdge::released(ButtonType::DPadDown));
    assert_eq!(rig.tick_at(810), vec![OutputAction::KeyUp(KeyKind::Down)]);
}

#[test]
fn test_trigger_reaches_full_speed_only_after_ramp() {
    let mut rig = Rig::new(MemoryProfileStore::with_fallback_default());
    rig.pads.connect(&pad(), "Xbox Controller");
    rig.pads.set_trigger(&pad(), TriggerSide::Left, AXIS_MAX);

    let mut full_speed_at = None;
    for ms in (0..=2100).step_by(5) {
        for action in rig.tick_at(ms) {
            let OutputAction::ScrollVertical(amount) = action else {
                panic!("unexpected action {:?}", action);
            };
            assert!(amount > 0 && amount <= 80, "amount {} at {}ms", amount, ms);
            if ms < 2000 {
                assert!(amount < 80, "full speed at {}ms", ms);
            } else if amount == 80 && full_speed_at.is_none() {
                full_speed_at = Some(ms);
            }
        }
    }
    assert!(full_speed_at.is_some());

    rig.pads.set_trigger(&pad(), TriggerSide::Left, 7999);
    assert!(rig.tick_at(2105).is_empty());
}

#[test]
fn test_unknown_device_gets_copy_of_default() {
    let mut rig = Rig::new(MemoryProfileStore::with_fallback_default());
    assert!(rig.driver.store().load_mapping(&pad()).is_none());

    rig.pads.connect(&pad(), "Xbox Controller");
    rig.tick_at(0);

    let copied = rig.driver.store().load_mapping(&pad()).unwrap();
    assert_eq!(copied["left_stick"]["action_type"], "cursor");
    assert_eq!(copied["name"], "Xbox Controller");
}

#[test]
fn test_missing_default_leaves_device_inert() {
    let mut rig = Rig::new(MemoryProfileStore::from_mappings(json!({})));
    rig.pads.connect(&pad(), "Xbox Controller");
    rig.pads.set_stick(&pad(), StickSide::Left, AXIS_MAX, AXIS_MAX);
    rig.pads.push_edge(&pad(), ButtonEdge::pressed(ButtonType::A));

    for ms in (0..100).step_by(5) {
        assert!(rig.tick_at(ms).is_empty());
    }
    assert_eq!(rig.driver.connected_devices().len(), 1);
    assert!(matches!(
        rig.driver.get_button_mapping(&pad(), ButtonType::A),
        Err(MappingError::MissingDefault(_))
    ));

    // An editor can still give the device a mapping of its own
    rig.driver
        .set_button_mapping(&pad(), ButtonType::A, &ButtonMapping::single(Action::Key(KeyKind::Enter)))
        .unwrap();
    assert!(rig.tick_at(100).is_empty(), "stale press must not replay");

    rig.pads.push_edge(&pad(), ButtonEdge::released(ButtonType::A));
    rig.pads.push_edge(&pad(), ButtonEdge::pressed(ButtonType::A));
    assert_eq!(rig.tick_at(105), vec![OutputAction::KeyDown(KeyKind::Enter)]);
}

#[test]
fn test_button_mapping_round_trip() {
    let mut rig = Rig::new(MemoryProfileStore::with_fallback_default());
    let mapping = ButtonMapping::single(Action::Key(KeyKind::Function(7)));

    rig.driver
        .set_button_mapping(&pad(), ButtonType::A, &mapping)
        .unwrap();
    rig.driver.invalidate_cache(Some(&pad()));

    assert_eq!(
        rig.driver.get_button_mapping(&pad(), ButtonType::A).unwrap(),
        mapping
    );
    // Other buttons still come from the default template
    assert_eq!(
        rig.driver.get_button_mapping(&pad(), ButtonType::B).unwrap().actions[0].action,
        Action::Key(KeyKind::Escape)
    );
}

#[test]
fn test_trigger_edit_releases_and_waits_for_new_press() {
    let mut rig = Rig::new(MemoryProfileStore::with_fallback_default());
    let mut trigger = rig
        .driver
        .get_trigger_mapping(&pad(), TriggerSide::Right)
        .unwrap();
    trigger.action_type = TriggerActionType::Button;
    trigger.button = ButtonMapping::single(Action::Mouse(MouseButton::Right));
    rig.driver
        .set_trigger_mapping(&pad(), TriggerSide::Right, &trigger)
        .unwrap();

    rig.pads.connect(&pad(), "Xbox Controller");
    rig.pads.set_trigger(&pad(), TriggerSide::Right, AXIS_MAX);
    assert_eq!(rig.tick_at(0), vec![OutputAction::MouseDown(MouseButton::Right)]);

    trigger.button = ButtonMapping::single(Action::Mouse(MouseButton::Middle));
    rig.driver
        .set_trigger_mapping(&pad(), TriggerSide::Right, &trigger)
        .unwrap();
    assert_eq!(rig.sink.drain(), vec![OutputAction::MouseUp(MouseButton::Right)]);

    // Still held: nothing until the trigger is let go and pressed again
    assert!(rig.tick_at(5).is_empty());
    rig.pads.set_trigger(&pad(), TriggerSide::Right, 0);
    assert!(rig.tick_at(10).is_empty());
    rig.pads.set_trigger(&pad(), TriggerSide::Right, AXIS_MAX);
    assert_eq!(rig.tick_at(15), vec![OutputAction::MouseDown(MouseButton::Middle)]);
}

#[test]
fn test_stick_edit_resets_velocity() {
    let mut rig = Rig::new(MemoryProfileStore::with_fallback_default());
    rig.pads.connect(&pad(), "Xbox Controller");
    rig.pads.set_stick(&pad(), StickSide::Left, AXIS_MAX, 0);
    rig.tick_at(0);
    rig.tick_at(5);
    let session = rig.driver.session(&pad()).unwrap();
    assert!(session.velocity(StickSide::Left).x > 0.0);

    let mut stick = rig.driver.get_stick_mapping(&pad(), StickSide::Left).unwrap();
    stick.action_type = StickActionType::Scroll;
    rig.driver
        .set_stick_mapping(&pad(), StickSide::Left, &stick)
        .unwrap();

    let session = rig.driver.session(&pad()).unwrap();
    assert_eq!(session.velocity(StickSide::Left), Velocity::default());

    // Scroll mode now: pushing right scrolls right
    let actions = rig.tick_at(10);
    assert!(matches!(actions.as_slice(), [OutputAction::ScrollHorizontal(n)] if *n > 0));
}

#[test]
fn test_disconnect_and_reconnect() {
    let mut rig = Rig::new(MemoryProfileStore::with_fallback_default());
    rig.pads.connect(&pad(), "Xbox Controller");
    rig.tick_at(0);
    rig.pads.push_edge(&pad(), ButtonEdge::pressed(ButtonType::RightShoulder));
    assert_eq!(rig.tick_at(5), vec![OutputAction::MouseDown(MouseButton::Right)]);

    rig.pads.disconnect(&pad());
    assert_eq!(rig.tick_at(10), vec![OutputAction::MouseUp(MouseButton::Right)]);
    assert!(rig.driver.session(&pad()).is_none());

    rig.pads.connect(&pad(), "Xbox Controller");
    assert!(rig.tick_at(15).is_empty());
    let known = rig.driver.known_devices();
    assert_eq!(known.len(), 1);
    assert!(known[&pad()].last_seen >= known[&pad()].first_seen);
}

#[test]
fn test_actions_without_enabled_flag_stay_inert() {
    let mut rig = Rig::new(MemoryProfileStore::from_mappings(json!({
        "default": {
            "buttons": {
                "button_a": { "enabled": true, "actions": [ { "action_type": "mouse_left_click" } ] },
                "button_b": {
                    "enabled": true,
                    "actions": [ { "action_type": "mouse_left_click", "enabled": true } ],
                },
            },
        }
    })));
    rig.pads.connect(&pad(), "Xbox Controller");
    rig.tick_at(0);

    rig.pads.push_edge(&pad(), ButtonEdge::pressed(ButtonType::A));
    assert!(rig.tick_at(5).is_empty());

    rig.pads.push_edge(&pad(), ButtonEdge::pressed(ButtonType::B));
    assert_eq!(rig.tick_at(10), vec![OutputAction::MouseDown(MouseButton::Left)]);
}
