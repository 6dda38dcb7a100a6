//! Press/repeat/release state machine for digital controls
//!
//! ```text
//! Released ──press──► Pressed ──delay elapsed──► Repeating
//!    ▲                   │                          │
//!    └──────release──────┴──────────release─────────┘
//! ```
//!
//! Buttons and triggers in button mode share this machine. A press sends a
//! down for every enabled action and remembers them; the release sends the
//! matching ups, so an action can never be left held.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::controller::{ButtonState, Control};
use crate::mapping::{Action, ButtonMapping, KeyKind};
use crate::output::OutputAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PressPhase {
    Pressed,
    Repeating,
}

#[derive(Clone, Debug)]
struct RepeatTimer {
    key: KeyKind,
    delay: Duration,
    interval: Duration,
    last_repeat: Instant,
}

/// Bookkeeping for one held control
#[derive(Clone, Debug)]
pub struct PressRecord {
    down: Vec<Action>,
    repeats: Vec<RepeatTimer>,
    pressed_at: Instant,
    phase: PressPhase,
}

impl PressRecord {
    pub fn phase(&self) -> PressPhase {
        self.phase
    }

    /// Actions currently held down, in press order
    pub fn down_actions(&self) -> &[Action] {
        &self.down
    }

    pub fn pressed_at(&self) -> Instant {
        self.pressed_at
    }

    fn tick(&mut self, now: Instant, out: &mut Vec<OutputAction>) {
        let held = now.saturating_duration_since(self.pressed_at);
        for timer in &mut self.repeats {
            if held < timer.delay {
                continue;
            }
            if now.saturating_duration_since(timer.last_repeat) < timer.interval {
                continue;
            }
            out.push(OutputAction::KeyDown(timer.key));
            out.push(OutputAction::KeyUp(timer.key));
            timer.last_repeat = now;
            self.phase = PressPhase::Repeating;
        }
    }
}

#[derive(Debug, Default)]
pub struct DigitalState {
    held: BTreeSet<Control>,
    records: BTreeMap<Control, PressRecord>,
}

impl DigitalState {
    pub fn is_held(&self, control: Control) -> bool {
        self.held.contains(&control)
    }

    pub fn record(&self, control: Control) -> Option<&PressRecord> {
        self.records.get(&control)
    }

    pub fn on_edge(
        &mut self,
        control: Control,
        state: ButtonState,
        mapping: &ButtonMapping,
        now: Instant,
        out: &mut Vec<OutputAction>,
    ) {
        match state {
            ButtonState::Pressed => self.press(control, mapping, now, out),
            ButtonState::Released => self.release(control, out),
        }
    }

    pub fn press(
        &mut self,
        control: Control,
        mapping: &ButtonMapping,
        now: Instant,
        out: &mut Vec<OutputAction>,
    ) {
        if !self.held.insert(control) {
            debug!("{} pressed while already held, ignoring", control);
            return;
        }
        if !mapping.enabled {
            return;
        }

        let mut record = PressRecord {
            down: Vec::new(),
            repeats: Vec::new(),
            pressed_at: now,
            phase: PressPhase::Pressed,
        };

        for action in mapping.actions.iter().filter(|a| a.enabled) {
            match action.action {
                Action::None => continue,
                Action::Mouse(button) => out.push(OutputAction::MouseDown(button)),
                Action::Key(key) => {
                    out.push(OutputAction::KeyDown(key));
                    if action.repeat_on_hold {
                        record.repeats.push(RepeatTimer {
                            key,
                            delay: action.repeat_delay(),
                            interval: action.repeat_interval(),
                            last_repeat: now,
                        });
                    }
                }
            }
            record.down.push(action.action);
        }

        if !record.down.is_empty() {
            debug!("{} down: {:?}", control, record.down);
            self.records.insert(control, record);
        }
    }

    /// Send ups for everything `control` holds down, newest first
    pub fn release(&mut self, control: Control, out: &mut Vec<OutputAction>) {
        self.held.remove(&control);
        if let Some(record) = self.records.remove(&control) {
            for action in record.down.iter().rev() {
                match action {
                    Action::Mouse(button) => out.push(OutputAction::MouseUp(*button)),
                    Action::Key(key) => out.push(OutputAction::KeyUp(*key)),
                    Action::None => {}
                }
            }
        }
    }

    /// Drop the press record of `control` (sending its ups) but keep it marked
    /// as held, so the physical release that follows is a no-op
    pub fn force_release(&mut self, control: Control, out: &mut Vec<OutputAction>) {
        let held = self.held.contains(&control);
        self.release(control, out);
        if held {
            self.held.insert(control);
        }
    }

    pub fn release_all(&mut self, out: &mut Vec<OutputAction>) {
        let controls: BTreeSet<Control> = self
            .held
            .iter()
            .chain(self.records.keys())
            .copied()
            .collect();
        for control in controls {
            self.release(control, out);
        }
    }

    /// Emit due auto-repeat taps
    pub fn tick(&mut self, now: Instant, out: &mut Vec<OutputAction>) {
        for record in self.records.values_mut() {
            record.tick(now, out);
        }
    }
}
