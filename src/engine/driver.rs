//! Poll driver with statum typestate for its lifecycle
//!
//! ```text
//! Idle ──start──► Running ──stop──► Stopped
//! ```
//!
//! # Tick
//!
//! ```text
//! DeviceSource ──events──► sessions (connect/disconnect)
//!      │
//!      └──samples──► SessionState::process ──actions──► InputSink
//!                          ▲
//!                  MappingResolver (cached records)
//! ```
//!
//! The running driver is the single owner of sessions, the mapping cache and
//! the profile store. Editor operations reach it as messages between ticks.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use chrono::Utc;
use statum::{machine, state};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::error::EngineError;
use super::handle::EditorCommand;
use super::session::SessionState;
use super::timing::FrameClock;
use crate::controller::{
    ButtonType, Control, DeviceEvent, DeviceId, DeviceSource, StickSide, TriggerSide,
};
use crate::mapping::{ButtonMapping, MappingError, MappingResolver, StickMapping, TriggerMapping};
use crate::output::{InputSink, OutputAction};
use crate::persistence::{KnownDevice, ProfileStore, StoreSnapshot};

#[derive(Clone, Debug, PartialEq)]
pub struct DriverSettings {
    /// Longest tick gap taken at face value, in seconds
    pub max_dt: f32,
    /// Substituted for the first tick and for gaps over `max_dt`
    pub default_dt: f32,
    pub trigger_scroll_interval: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            max_dt: 0.1,
            default_dt: 0.005,
            trigger_scroll_interval: Duration::from_millis(10),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum DriverState {
    Idle,
    Running,
    Stopped,
}

#[machine]
pub struct PollDriver<S: DriverState> {
    source: Box<dyn DeviceSource>,
    sink: Box<dyn InputSink>,
    resolver: MappingResolver,
    sessions: HashMap<DeviceId, SessionState>,
    clock: FrameClock,
    settings: DriverSettings,
    persist_tx: Option<mpsc::UnboundedSender<StoreSnapshot>>,
}

impl<S: DriverState> PollDriver<S> {
    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    pub fn session(&self, device: &DeviceId) -> Option<&SessionState> {
        self.sessions.get(device)
    }

    /// Connected devices and their names, ordered by identity
    pub fn connected_devices(&self) -> Vec<(DeviceId, String)> {
        let mut devices: Vec<(DeviceId, String)> = self
            .sessions
            .iter()
            .map(|(id, session)| (id.clone(), session.name().to_string()))
            .collect();
        devices.sort();
        devices
    }

    pub fn known_devices(&self) -> BTreeMap<DeviceId, KnownDevice> {
        self.resolver.store().known_devices()
    }

    pub fn store(&self) -> &dyn ProfileStore {
        self.resolver.store()
    }

    /// Send actions in order. A failed action is logged and the rest are
    /// still sent, so releases reach the sink after a failed press.
    fn dispatch(&mut self, device: &DeviceId, actions: Vec<OutputAction>) {
        for action in actions {
            if let Err(e) = action.apply(self.sink.as_mut()) {
                warn!("Failed to send {:?} for {}: {}", action, device, e);
            }
        }
    }

    fn release_all_sessions(&mut self) {
        let devices: Vec<DeviceId> = self.sessions.keys().cloned().collect();
        for device in devices {
            let mut out = Vec::new();
            if let Some(session) = self.sessions.get_mut(&device) {
                session.release_all(&mut out);
            }
            if !out.is_empty() {
                info!("Releasing {} held action(s) on {}", out.len(), device);
            }
            self.dispatch(&device, out);
        }
    }

    /// Queue the current store contents for the persistence worker
    fn persist(&self) -> Result<(), EngineError> {
        let Some(tx) = &self.persist_tx else {
            return Ok(());
        };
        let Some(snapshot) = self.resolver.store().snapshot() else {
            return Ok(());
        };
        tx.send(snapshot).map_err(|_| {
            EngineError::ChannelError("Persistence worker is not running".to_string())
        })
    }

    fn persist_or_warn(&self) {
        if let Err(e) = self.persist() {
            warn!("Mapping changes not persisted: {}", e);
        }
    }
}

impl PollDriver<Idle> {
    pub fn create(
        source: Box<dyn DeviceSource>,
        sink: Box<dyn InputSink>,
        store: Box<dyn ProfileStore>,
        settings: DriverSettings,
    ) -> Self {
        info!(
            "Initializing poll driver (max dt {}s, trigger scroll every {}ms)",
            settings.max_dt,
            settings.trigger_scroll_interval.as_millis()
        );
        let clock = FrameClock::new(settings.max_dt, settings.default_dt);

        Self::new(
            source,
            sink,
            MappingResolver::new(store),
            HashMap::new(), // sessions
            clock,
            settings,
            None, // persist_tx
        )
    }

    /// Ship a snapshot to `tx` after every store change
    pub fn with_persistence(mut self, tx: mpsc::UnboundedSender<StoreSnapshot>) -> Self {
        self.persist_tx = Some(tx);
        self
    }

    pub fn start(self) -> PollDriver<Running> {
        info!("Poll driver running");
        self.transition()
    }
}

impl PollDriver<Running> {
    /// One poll cycle: connection events, then every connected device
    pub fn tick(&mut self, now: Instant) {
        for event in self.source.poll_events() {
            match event {
                DeviceEvent::Connected { device, name } => self.on_connected(device, name, now),
                DeviceEvent::Disconnected { device } => self.on_disconnected(&device),
            }
        }

        let dt = self.clock.delta(now);
        let devices: Vec<DeviceId> = self.sessions.keys().cloned().collect();
        for device in devices {
            self.tick_device(&device, now, dt);
        }
    }

    fn tick_device(&mut self, device: &DeviceId, now: Instant, dt: f32) {
        let record = match self.resolver.record(device) {
            Ok(record) => record,
            Err(e) => {
                self.report_unusable_mapping(device, &e);
                // Drop edges so a later fix does not replay stale presses
                if let Err(e) = self.source.read_button_edges(device) {
                    debug!("Failed to drain edges of {}: {}", device, e);
                }
                return;
            }
        };

        let sample = match self.source.read_sample(device) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Skipping {} this tick: {}", device, e);
                return;
            }
        };

        let Some(session) = self.sessions.get_mut(device) else {
            return;
        };
        let actions = session.process(&record, &sample, now, dt);
        self.dispatch(device, actions);
    }

    fn report_unusable_mapping(&mut self, device: &DeviceId, e: &MappingError) {
        match e {
            MappingError::MissingDefault(_) => {
                let first = self
                    .sessions
                    .get_mut(device)
                    .map(SessionState::report_missing_default)
                    .unwrap_or(false);
                if first {
                    error!("{}, device {} stays inert", e, device);
                }
            }
            MappingError::Store(_) => warn!("Skipping {} this tick: {}", device, e),
        }
    }

    fn on_connected(&mut self, device: DeviceId, name: String, now: Instant) {
        info!("Controller connected: {} ({})", name, device);

        if self.sessions.contains_key(&device) {
            warn!("{} connected twice, resetting its session", device);
            self.on_disconnected(&device);
        }

        self.resolver
            .store_mut()
            .remember_device(&device, &name, Utc::now());

        let mut session = SessionState::new(name, now, self.settings.trigger_scroll_interval);
        match self.resolver.record(&device) {
            Ok(record) => info!("Mapping for {}: {}", device, record.summary()),
            Err(e) => {
                if matches!(e, MappingError::MissingDefault(_)) {
                    session.report_missing_default();
                }
                error!("{}, device {} stays inert", e, device);
            }
        }

        self.sessions.insert(device, session);
        self.persist_or_warn();
    }

    fn on_disconnected(&mut self, device: &DeviceId) {
        let Some(mut session) = self.sessions.remove(device) else {
            debug!("Disconnect for unknown device {}", device);
            return;
        };

        let mut out = Vec::new();
        session.release_all(&mut out);
        if !out.is_empty() {
            info!("Releasing {} held action(s) on {}", out.len(), device);
        }
        self.dispatch(device, out);
        self.resolver.invalidate(Some(device));
        info!("Controller disconnected: {} ({})", session.name(), device);
    }

    /// Force-release `control` on a connected device
    fn release_control(&mut self, device: &DeviceId, control: Control) {
        let mut out = Vec::new();
        if let Some(session) = self.sessions.get_mut(device) {
            session.release_control(control, &mut out);
        }
        if !out.is_empty() {
            debug!("Mapping of {} on {} changed, released it", control, device);
        }
        self.dispatch(device, out);
    }

    pub fn get_stick_mapping(
        &mut self,
        device: &DeviceId,
        side: StickSide,
    ) -> Result<StickMapping, MappingError> {
        self.resolver.get_stick(device, side)
    }

    pub fn set_stick_mapping(
        &mut self,
        device: &DeviceId,
        side: StickSide,
        mapping: &StickMapping,
    ) -> Result<(), MappingError> {
        self.resolver.set_stick(device, side, mapping)?;
        if let Some(session) = self.sessions.get_mut(device) {
            session.reset_velocity(side);
        }
        info!("Updated {} mapping of {}", side.key(), device);
        self.persist_or_warn();
        Ok(())
    }

    pub fn get_button_mapping(
        &mut self,
        device: &DeviceId,
        button: ButtonType,
    ) -> Result<ButtonMapping, MappingError> {
        self.resolver.get_button(device, button)
    }

    pub fn set_button_mapping(
        &mut self,
        device: &DeviceId,
        button: ButtonType,
        mapping: &ButtonMapping,
    ) -> Result<(), MappingError> {
        self.release_control(device, Control::Button(button));
        self.resolver.set_button(device, button, mapping)?;
        info!("Updated {} mapping of {}", button, device);
        self.persist_or_warn();
        Ok(())
    }

    pub fn get_trigger_mapping(
        &mut self,
        device: &DeviceId,
        side: TriggerSide,
    ) -> Result<TriggerMapping, MappingError> {
        self.resolver.get_trigger(device, side)
    }

    pub fn set_trigger_mapping(
        &mut self,
        device: &DeviceId,
        side: TriggerSide,
        mapping: &TriggerMapping,
    ) -> Result<(), MappingError> {
        self.release_control(device, Control::Trigger(side));
        self.resolver.set_trigger(device, side, mapping)?;
        info!("Updated {} mapping of {}", side.key(), device);
        self.persist_or_warn();
        Ok(())
    }

    pub fn invalidate_cache(&mut self, device: Option<&DeviceId>) {
        match device {
            Some(device) => debug!("Invalidating cached mapping of {}", device),
            None => debug!("Invalidating all cached mappings"),
        }
        self.resolver.invalidate(device);
    }

    pub fn handle_command(&mut self, command: EditorCommand) {
        match command {
            EditorCommand::GetStick {
                device,
                side,
                response_tx,
            } => reply(response_tx, self.get_stick_mapping(&device, side)),
            EditorCommand::SetStick {
                device,
                side,
                mapping,
                response_tx,
            } => reply(response_tx, self.set_stick_mapping(&device, side, &mapping)),
            EditorCommand::GetButton {
                device,
                button,
                response_tx,
            } => reply(response_tx, self.get_button_mapping(&device, button)),
            EditorCommand::SetButton {
                device,
                button,
                mapping,
                response_tx,
            } => reply(
                response_tx,
                self.set_button_mapping(&device, button, &mapping),
            ),
            EditorCommand::GetTrigger {
                device,
                side,
                response_tx,
            } => reply(response_tx, self.get_trigger_mapping(&device, side)),
            EditorCommand::SetTrigger {
                device,
                side,
                mapping,
                response_tx,
            } => reply(
                response_tx,
                self.set_trigger_mapping(&device, side, &mapping),
            ),
            EditorCommand::InvalidateCache {
                device,
                response_tx,
            } => {
                self.invalidate_cache(device.as_ref());
                reply(response_tx, ());
            }
            EditorCommand::ConnectedDevices { response_tx } => {
                reply(response_tx, self.connected_devices())
            }
            EditorCommand::KnownDevices { response_tx } => reply(response_tx, self.known_devices()),
        }
    }

    /// Main loop: tick on `poll_interval`, serve editor commands in between
    ///
    /// Runs until the shutdown signal arrives, then releases everything and
    /// flushes the store.
    pub async fn run_until_shutdown(
        mut self,
        poll_interval: Duration,
        mut commands: mpsc::Receiver<EditorCommand>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<PollDriver<Stopped>, EngineError> {
        info!("Starting poll loop every {}ms", poll_interval.as_millis());

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All editor clients dropped");
                        commands_open = false;
                    }
                },

                now = interval.tick() => self.tick(now.into_std()),
            }
        }

        self.stop()
    }

    /// Release every held action, flush the store and stop
    pub fn stop(mut self) -> Result<PollDriver<Stopped>, EngineError> {
        info!("Stopping poll driver");
        self.release_all_sessions();
        self.persist()?;
        Ok(self.transition())
    }
}

impl PollDriver<Stopped> {}

fn reply<T>(response_tx: oneshot::Sender<T>, value: T) {
    if response_tx.send(value).is_err() {
        debug!("Editor dropped its reply channel");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ButtonEdge, VirtualPads, AXIS_MAX};
    use crate::mapping::{Action, ButtonAction, KeyKind, MouseButton};
    use crate::output::{RecordingSink, SinkError};
    use crate::persistence::MemoryProfileStore;

    fn driver(pads: &VirtualPads, sink: &RecordingSink) -> PollDriver<Running> {
        PollDriver::create(
            Box::new(pads.clone()),
            Box::new(sink.clone()),
            Box::new(MemoryProfileStore::with_fallback_default()),
            DriverSettings::default(),
        )
        .start()
    }

    #[test]
    fn test_connect_remembers_device() {
        let pads = VirtualPads::new();
        let sink = RecordingSink::new();
        let mut driver = driver(&pads, &sink);
        let id = DeviceId::from("pad-1");

        pads.connect(&id, "Test Pad");
        driver.tick(Instant::now());

        assert_eq!(
            driver.connected_devices(),
            vec![(id.clone(), "Test Pad".to_string())]
        );
        assert_eq!(driver.known_devices()[&id].name, "Test Pad");
    }

    #[test]
    fn test_disconnect_releases_held_button() {
        let pads = VirtualPads::new();
        let sink = RecordingSink::new();
        let mut driver = driver(&pads, &sink);
        let id = DeviceId::from("pad-1");
        let now = Instant::now();

        pads.connect(&id, "Test Pad");
        driver.tick(now);
        driver
            .set_button_mapping(&id, ButtonType::A, &ButtonMapping::single(Action::Mouse(MouseButton::Left)))
            .unwrap();
        pads.push_edge(&id, ButtonEdge::pressed(ButtonType::A));
        driver.tick(now + Duration::from_millis(5));
        assert_eq!(sink.drain(), vec![OutputAction::MouseDown(MouseButton::Left)]);

        pads.disconnect(&id);
        driver.tick(now + Duration::from_millis(10));
        assert_eq!(sink.drain(), vec![OutputAction::MouseUp(MouseButton::Left)]);
        assert!(driver.connected_devices().is_empty());
    }

    #[test]
    fn test_read_errors_skip_the_device() {
        let pads = VirtualPads::new();
        let sink = RecordingSink::new();
        let mut driver = driver(&pads, &sink);
        let id = DeviceId::from("pad-1");
        let now = Instant::now();

        pads.connect(&id, "Test Pad");
        pads.set_stick(&id, StickSide::Left, AXIS_MAX, 0);
        pads.set_failing(&id, true);
        driver.tick(now);
        assert!(sink.drain().is_empty());

        pads.set_failing(&id, false);
        driver.tick(now + Duration::from_millis(5));
        assert!(matches!(sink.drain().as_slice(), [OutputAction::MoveCursor { .. }]));
    }

    #[test]
    fn test_edit_button_force_releases() {
        let pads = VirtualPads::new();
        let sink = RecordingSink::new();
        let mut driver = driver(&pads, &sink);
        let id = DeviceId::from("pad-1");
        let now = Instant::now();

        pads.connect(&id, "Test Pad");
        driver.tick(now);
        pads.push_edge(&id, ButtonEdge::pressed(ButtonType::A));
        driver.tick(now + Duration::from_millis(5));
        let downs = sink.drain();
        assert!(!downs.is_empty() && downs.iter().all(OutputAction::is_down));

        driver
            .set_button_mapping(&id, ButtonType::A, &ButtonMapping::single(Action::Key(KeyKind::Tab)))
            .unwrap();
        let ups = sink.drain();
        assert_eq!(ups.len(), downs.len());
        assert!(ups.iter().all(|a| !a.is_down()));

        // The physical release of the old press sends nothing
        pads.push_edge(&id, ButtonEdge::released(ButtonType::A));
        driver.tick(now + Duration::from_millis(10));
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_stop_releases_everything() {
        let pads = VirtualPads::new();
        let sink = RecordingSink::new();
        let mut driver = driver(&pads, &sink);
        let id = DeviceId::from("pad-1");
        let now = Instant::now();

        pads.connect(&id, "Test Pad");
        driver.tick(now);
        pads.push_edge(&id, ButtonEdge::pressed(ButtonType::A));
        driver.tick(now + Duration::from_millis(5));
        let downs = sink.drain().len();

        assert!(driver.stop().is_ok());
        assert_eq!(sink.drain().len(), downs);
    }

    /// Refuses mouse presses and records everything else
    struct NoMouseDown(RecordingSink);

    impl InputSink for NoMouseDown {
        fn move_cursor(&mut self, dx: f32, dy: f32) -> Result<(), SinkError> {
            self.0.move_cursor(dx, dy)
        }

        fn scroll_vertical(&mut self, amount: i32) -> Result<(), SinkError> {
            self.0.scroll_vertical(amount)
        }

        fn scroll_horizontal(&mut self, amount: i32) -> Result<(), SinkError> {
            self.0.scroll_horizontal(amount)
        }

        fn mouse_down(&mut self, _button: MouseButton) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("mouse".to_string()))
        }

        fn mouse_up(&mut self, button: MouseButton) -> Result<(), SinkError> {
            self.0.mouse_up(button)
        }

        fn key_down(&mut self, key: KeyKind) -> Result<(), SinkError> {
            self.0.key_down(key)
        }

        fn key_up(&mut self, key: KeyKind) -> Result<(), SinkError> {
            self.0.key_up(key)
        }
    }

    #[test]
    fn test_sink_error_does_not_stop_remaining_actions() {
        let pads = VirtualPads::new();
        let sink = RecordingSink::new();
        let mut driver = PollDriver::create(
            Box::new(pads.clone()),
            Box::new(NoMouseDown(sink.clone())),
            Box::new(MemoryProfileStore::with_fallback_default()),
            DriverSettings::default(),
        )
        .start();
        let id = DeviceId::from("pad-1");
        let now = Instant::now();
        let mapping = ButtonMapping {
            enabled: true,
            actions: vec![
                ButtonAction::new(Action::Mouse(MouseButton::Left)),
                ButtonAction::new(Action::Key(KeyKind::Ctrl)),
            ],
        };

        pads.connect(&id, "Test Pad");
        driver.tick(now);
        driver.set_button_mapping(&id, ButtonType::A, &mapping).unwrap();

        pads.push_edge(&id, ButtonEdge::pressed(ButtonType::A));
        driver.tick(now + Duration::from_millis(5));
        assert_eq!(sink.drain(), vec![OutputAction::KeyDown(KeyKind::Ctrl)]);

        pads.push_edge(&id, ButtonEdge::released(ButtonType::A));
        driver.tick(now + Duration::from_millis(10));
        assert_eq!(
            sink.drain(),
            vec![
                OutputAction::KeyUp(KeyKind::Ctrl),
                OutputAction::MouseUp(MouseButton::Left),
            ]
        );
    }
}
