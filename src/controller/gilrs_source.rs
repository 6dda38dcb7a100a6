use std::collections::HashMap;

use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

use super::device_source::{DeviceEvent, DeviceSource, SourceError};
use super::types::{ButtonEdge, ButtonType, DeviceId, StickSide, TriggerSide, AXIS_MAX};

/// [`DeviceSource`] backed by gilrs
///
/// Button edges are collected from the gilrs event queue and buffered per
/// device. Analog values are read from the cached gamepad state on demand.
pub struct GilrsSource {
    gilrs: Gilrs,
    ids: HashMap<GamepadId, DeviceId>,
    handles: HashMap<DeviceId, GamepadId>,
    pending_edges: HashMap<DeviceId, Vec<ButtonEdge>>,
}

impl GilrsSource {
    pub fn create() -> Result<Self, SourceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(SourceError::Initialization(e.to_string()));
            }
        };

        Ok(Self {
            gilrs,
            ids: HashMap::new(),
            handles: HashMap::new(),
            pending_edges: HashMap::new(),
        })
    }

    fn register(&mut self, id: GamepadId, events: &mut Vec<DeviceEvent>) {
        if self.ids.contains_key(&id) {
            return;
        }
        let gamepad = self.gilrs.gamepad(id);
        let device = device_identity(&gamepad);
        let name = gamepad.name().to_string();

        info!("Gamepad {} connected: {} ({})", id, name, device);
        self.ids.insert(id, device.clone());
        self.handles.insert(device.clone(), id);
        self.pending_edges.insert(device.clone(), Vec::new());
        events.push(DeviceEvent::Connected { device, name });
    }

    fn unregister(&mut self, id: GamepadId, events: &mut Vec<DeviceEvent>) {
        if let Some(device) = self.ids.remove(&id) {
            warn!("Gamepad {} disconnected ({})", id, device);
            self.handles.remove(&device);
            self.pending_edges.remove(&device);
            events.push(DeviceEvent::Disconnected { device });
        }
    }

    fn connected(&self, device: &DeviceId) -> Result<Gamepad<'_>, SourceError> {
        self.handles
            .get(device)
            .and_then(|id| self.gilrs.connected_gamepad(*id))
            .ok_or_else(|| SourceError::NotConnected(device.clone()))
    }
}

impl DeviceSource for GilrsSource {
    fn poll_events(&mut self) -> Vec<DeviceEvent> {
        let mut events = Vec::new();

        // Pads present before the first poll never produce a Connected event
        let present: Vec<GamepadId> = self.gilrs.gamepads().map(|(id, _)| id).collect();
        for id in present {
            self.register(id, &mut events);
        }

        while let Some(Event { id, event, time, .. }) = self.gilrs.next_event() {
            debug!("Processing gilrs event: {:?} at time: {:?}", event, time);
            match event {
                EventType::Connected => self.register(id, &mut events),
                EventType::Disconnected => self.unregister(id, &mut events),
                EventType::ButtonPressed(button, _) => self.push_edge(id, button, true),
                EventType::ButtonReleased(button, _) => self.push_edge(id, button, false),
                _ => {}
            }
        }

        events
    }

    fn read_stick(&mut self, device: &DeviceId, side: StickSide) -> Result<(i32, i32), SourceError> {
        let gamepad = self.connected(device)?;
        let (axis_x, axis_y) = match side {
            StickSide::Left => (Axis::LeftStickX, Axis::LeftStickY),
            StickSide::Right => (Axis::RightStickX, Axis::RightStickY),
        };
        // gilrs reports Y up-positive
        Ok((
            scale_axis(gamepad.value(axis_x)),
            scale_axis(-gamepad.value(axis_y)),
        ))
    }

    fn read_trigger(&mut self, device: &DeviceId, side: TriggerSide) -> Result<i32, SourceError> {
        let gamepad = self.connected(device)?;
        let (button, axis) = match side {
            TriggerSide::Left => (Button::LeftTrigger2, Axis::LeftZ),
            TriggerSide::Right => (Button::RightTrigger2, Axis::RightZ),
        };
        let value = gamepad
            .button_data(button)
            .map(|data| data.value())
            .unwrap_or_else(|| gamepad.value(axis));
        Ok(scale_axis(value.clamp(0.0, 1.0)))
    }

    fn read_button_edges(&mut self, device: &DeviceId) -> Result<Vec<ButtonEdge>, SourceError> {
        self.pending_edges
            .get_mut(device)
            .map(std::mem::take)
            .ok_or_else(|| SourceError::NotConnected(device.clone()))
    }
}

impl GilrsSource {
    fn push_edge(&mut self, id: GamepadId, button: Button, pressed: bool) {
        let Some(button_type) = map_button(button) else {
            return;
        };
        let Some(device) = self.ids.get(&id) else {
            return;
        };
        debug!("Button {:?} -> {} pressed={}", button, button_type, pressed);
        let edge = if pressed {
            ButtonEdge::pressed(button_type)
        } else {
            ButtonEdge::released(button_type)
        };
        self.pending_edges.entry(device.clone()).or_default().push(edge);
    }
}

fn device_identity(gamepad: &Gamepad<'_>) -> DeviceId {
    let guid: String = gamepad.uuid().iter().map(|b| format!("{b:02x}")).collect();
    DeviceId::new(guid)
}

fn scale_axis(value: f32) -> i32 {
    (value.clamp(-1.0, 1.0) * AXIS_MAX as f32).round() as i32
}

// Helper function to map gilrs Button to our ButtonType
fn map_button(button: Button) -> Option<ButtonType> {
    match button {
        Button::South => Some(ButtonType::A),
        Button::East => Some(ButtonType::B),
        Button::West => Some(ButtonType::X),
        Button::North => Some(ButtonType::Y),
        Button::Start => Some(ButtonType::Start),
        Button::Select => Some(ButtonType::Back),
        Button::LeftTrigger => Some(ButtonType::LeftShoulder),
        Button::RightTrigger => Some(ButtonType::RightShoulder),
        Button::LeftThumb => Some(ButtonType::LeftStick),
        Button::RightThumb => Some(ButtonType::RightStick),
        Button::DPadUp => Some(ButtonType::DPadUp),
        Button::DPadDown => Some(ButtonType::DPadDown),
        Button::DPadLeft => Some(ButtonType::DPadLeft),
        Button::DPadRight => Some(ButtonType::DPadRight),
        Button::Mode => Some(ButtonType::Guide),
        _ => None,
    }
}
