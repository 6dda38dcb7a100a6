//! Per-device session state
//!
//! A session exists from connect to disconnect and carries everything the
//! engine remembers between ticks: cursor velocities, boost flags, held
//! controls, trigger crossing times and the trigger scroll rate limiter.

use std::time::{Duration, Instant};

use tracing::debug;

use super::analog::{
    cursor_step, stick_scroll, trigger_scroll_amount, CursorDelta, TriggerRamp, Velocity,
};
use super::digital::DigitalState;
use super::timing::RateLimiter;
use crate::controller::{ButtonState, Control, DeviceSample, StickSide, TriggerSide};
use crate::mapping::{MappingRecord, StickActionType, TriggerActionType, TriggerMapping};
use crate::output::OutputAction;

#[derive(Debug)]
pub struct SessionState {
    name: String,
    connected_at: Instant,
    velocity: [Velocity; 2],
    boost: [bool; 2],
    digital: DigitalState,
    trigger_pressed: [bool; 2],
    trigger_ramp: [TriggerRamp; 2],
    scroll_limiter: RateLimiter,
    missing_default_reported: bool,
}

impl SessionState {
    pub fn new(name: impl Into<String>, now: Instant, trigger_scroll_interval: Duration) -> Self {
        Self {
            name: name.into(),
            connected_at: now,
            velocity: [Velocity::default(); 2],
            boost: [false; 2],
            digital: DigitalState::default(),
            trigger_pressed: [false; 2],
            trigger_ramp: [TriggerRamp::default(); 2],
            scroll_limiter: RateLimiter::new(trigger_scroll_interval),
            missing_default_reported: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    pub fn velocity(&self, side: StickSide) -> Velocity {
        self.velocity[side.index()]
    }

    pub fn is_boosted(&self, side: StickSide) -> bool {
        self.boost[side.index()]
    }

    pub fn digital(&self) -> &DigitalState {
        &self.digital
    }

    pub fn is_trigger_pressed(&self, side: TriggerSide) -> bool {
        self.trigger_pressed[side.index()]
    }

    /// Returns true the first time it is called for this session
    pub fn report_missing_default(&mut self) -> bool {
        !std::mem::replace(&mut self.missing_default_reported, true)
    }

    /// Run one tick for this device and return what to send to the sink
    pub fn process(
        &mut self,
        record: &MappingRecord,
        sample: &DeviceSample,
        now: Instant,
        dt: f32,
    ) -> Vec<OutputAction> {
        let mut out = Vec::new();

        for edge in &sample.edges {
            if let Some(side) = edge.button.boost_side() {
                let boosted = edge.state == ButtonState::Pressed;
                if self.boost[side.index()] != boosted {
                    debug!("{} boost {} on {}", side.key(), boosted, self.name);
                }
                self.boost[side.index()] = boosted;
                continue;
            }
            let control = Control::Button(edge.button);
            self.digital
                .on_edge(control, edge.state, record.button(edge.button), now, &mut out);
        }

        self.process_sticks(record, sample, dt, &mut out);
        self.process_triggers(record, sample, now, &mut out);
        self.digital.tick(now, &mut out);

        out
    }

    fn process_sticks(
        &mut self,
        record: &MappingRecord,
        sample: &DeviceSample,
        dt: f32,
        out: &mut Vec<OutputAction>,
    ) {
        let mut cursor = CursorDelta::default();

        for side in StickSide::ALL {
            let mapping = record.stick(side);
            let raw = sample.sticks[side.index()];
            let action = if mapping.enabled {
                mapping.action_type
            } else {
                StickActionType::None
            };

            match action {
                StickActionType::Cursor => {
                    cursor += cursor_step(
                        raw,
                        mapping,
                        self.boost[side.index()],
                        dt,
                        &mut self.velocity[side.index()],
                    );
                }
                StickActionType::Scroll => {
                    self.velocity[side.index()] = Velocity::default();
                    let amounts = stick_scroll(raw, mapping);
                    if amounts.vertical != 0 {
                        out.push(OutputAction::ScrollVertical(amounts.vertical));
                    }
                    if amounts.horizontal != 0 {
                        out.push(OutputAction::ScrollHorizontal(amounts.horizontal));
                    }
                }
                StickActionType::None => {
                    self.velocity[side.index()] = Velocity::default();
                }
            }
        }

        if !cursor.is_zero() {
            out.push(OutputAction::MoveCursor {
                dx: cursor.dx,
                dy: cursor.dy,
            });
        }
    }

    fn process_triggers(
        &mut self,
        record: &MappingRecord,
        sample: &DeviceSample,
        now: Instant,
        out: &mut Vec<OutputAction>,
    ) {
        let mut scroll = Vec::with_capacity(2);

        for side in TriggerSide::ALL {
            let mapping = record.trigger(side);
            let raw = sample.triggers[side.index()];
            let action = if mapping.enabled {
                mapping.action_type
            } else {
                TriggerActionType::None
            };

            if action != TriggerActionType::Button && self.trigger_pressed[side.index()] {
                self.trigger_pressed[side.index()] = false;
                self.digital.release(Control::Trigger(side), out);
            }
            if action != TriggerActionType::Scroll {
                self.trigger_ramp[side.index()].reset();
            }

            match action {
                TriggerActionType::Button => self.trigger_button(side, mapping, raw, now, out),
                TriggerActionType::Scroll => {
                    if let Some(held) =
                        self.trigger_ramp[side.index()].update(raw, mapping.threshold, now)
                    {
                        let amount = trigger_scroll_amount(raw, mapping, held);
                        if amount != 0 {
                            scroll.push(amount);
                        }
                    }
                }
                TriggerActionType::None => {}
            }
        }

        if !scroll.is_empty() && self.scroll_limiter.should_process(now) {
            out.extend(scroll.into_iter().map(OutputAction::ScrollVertical));
        }
    }

    fn trigger_button(
        &mut self,
        side: TriggerSide,
        mapping: &TriggerMapping,
        raw: i32,
        now: Instant,
        out: &mut Vec<OutputAction>,
    ) {
        let control = Control::Trigger(side);
        let pressed = raw >= mapping.threshold;
        let was_pressed = self.trigger_pressed[side.index()];

        if pressed && !was_pressed {
            self.digital.press(control, &mapping.button, now, out);
        } else if !pressed && was_pressed {
            self.digital.release(control, out);
        }
        self.trigger_pressed[side.index()] = pressed;
    }

    /// Force-release one control. A trigger stays marked as pressed so the
    /// user has to let go before it fires again.
    pub fn release_control(&mut self, control: Control, out: &mut Vec<OutputAction>) {
        self.digital.force_release(control, out);
        if let Control::Trigger(side) = control {
            self.trigger_ramp[side.index()].reset();
        }
    }

    pub fn reset_velocity(&mut self, side: StickSide) {
        self.velocity[side.index()] = Velocity::default();
    }

    /// Release everything held and forget all transient state
    pub fn release_all(&mut self, out: &mut Vec<OutputAction>) {
        self.digital.release_all(out);
        self.trigger_pressed = [false; 2];
        self.trigger_ramp = [TriggerRamp::default(); 2];
        self.velocity = [Velocity::default(); 2];
        self.boost = [false; 2];
    }
}
