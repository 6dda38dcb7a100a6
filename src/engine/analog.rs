//! Analog transforms: stick cursor motion, stick scrolling and trigger scrolling
//!
//! Everything here is a pure function of the raw sample, the mapping and the
//! bit of per-stick/per-trigger state passed in by the caller.

use std::ops::AddAssign;
use std::time::{Duration, Instant};

use crate::controller::AXIS_MAX;
use crate::mapping::{StickMapping, TriggerMapping};

/// Cursor speed in pixels per second at full deflection and sensitivity 1.0
pub const CURSOR_PIXELS_PER_SECOND: f32 = 60.0;

/// Gain applied after cubing the normalized stick deflection
pub const SCROLL_CURVE_GAIN: f32 = 2.0;

/// Stick scroll ignores deflection below this percentage
pub const SCROLL_MIN_PERCENT: f32 = 5.0;

pub const BASE_SCROLL_PER_TICK: f32 = 2.0;

/// Used when a trigger's `vertical_max_speed` is not positive
pub const FALLBACK_TRIGGER_MAX_SPEED: i32 = 40;

/// Time a trigger must be held to reach full scroll speed
pub const TRIGGER_RAMP: Duration = Duration::from_millis(2000);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CursorDelta {
    pub dx: f32,
    pub dy: f32,
}

impl CursorDelta {
    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

impl AddAssign for CursorDelta {
    fn add_assign(&mut self, other: Self) {
        self.dx += other.dx;
        self.dy += other.dy;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollAmounts {
    /// Positive scrolls up
    pub vertical: i32,
    /// Positive scrolls right
    pub horizontal: i32,
}

pub fn apply_deadzone(raw: i32, deadzone: i32) -> i32 {
    if i64::from(raw).abs() < i64::from(deadzone) {
        0
    } else {
        raw
    }
}

/// Raw sample as a percentage of full scale, clamped to [-100, 100]
pub fn to_percent(raw: i32) -> f32 {
    (raw as f32 / AXIS_MAX as f32).clamp(-1.0, 1.0) * 100.0
}

/// Exponential smoothing. `smoothing` 1.0 jumps straight to the target.
pub fn smooth(current: f32, target: f32, smoothing: f32) -> f32 {
    let s = smoothing.clamp(0.0, 1.0);
    current * (1.0 - s) + target * s
}

/// Advance the stick velocity toward its target and return this tick's motion
pub fn cursor_step(
    raw: (i32, i32),
    mapping: &StickMapping,
    boosted: bool,
    dt: f32,
    velocity: &mut Velocity,
) -> CursorDelta {
    let x = to_percent(apply_deadzone(raw.0, mapping.deadzone));
    let y = to_percent(apply_deadzone(raw.1, mapping.deadzone));

    let sensitivity = if boosted {
        mapping.cursor.boosted_sensitivity
    } else {
        mapping.cursor.sensitivity
    };

    let target_x = x * sensitivity * CURSOR_PIXELS_PER_SECOND;
    let target_y = y * sensitivity * CURSOR_PIXELS_PER_SECOND;

    velocity.x = smooth(velocity.x, target_x, mapping.cursor.smoothing);
    velocity.y = smooth(velocity.y, target_y, mapping.cursor.smoothing);

    CursorDelta {
        dx: velocity.x * dt,
        dy: velocity.y * dt,
    }
}

/// Cubic response curve for stick scrolling
pub fn scroll_curve(percent: f32) -> f32 {
    if percent.abs() < SCROLL_MIN_PERCENT {
        return 0.0;
    }
    let normalized = percent / 100.0;
    normalized.signum() * normalized.abs().powi(3) * SCROLL_CURVE_GAIN
}

pub fn stick_scroll(raw: (i32, i32), mapping: &StickMapping) -> ScrollAmounts {
    let x = to_percent(apply_deadzone(raw.0, mapping.deadzone));
    let y = to_percent(apply_deadzone(raw.1, mapping.deadzone));
    let scroll = &mapping.scroll;

    // Pushing the stick down (positive raw Y) scrolls down
    let vertical =
        -scroll_curve(y) * scroll.vertical_sensitivity * scroll.vertical_max_speed as f32;
    let horizontal =
        scroll_curve(x) * scroll.horizontal_sensitivity * scroll.horizontal_max_speed as f32;

    ScrollAmounts {
        vertical: vertical.round() as i32,
        horizontal: horizontal.round() as i32,
    }
}

/// How far past the threshold a trigger is, in [0, 1]
pub fn trigger_pressure(raw: i32, threshold: i32) -> f32 {
    let span = i64::from(AXIS_MAX) - i64::from(threshold);
    let past = i64::from(raw) - i64::from(threshold);
    if span <= 0 {
        return if past >= 0 { 1.0 } else { 0.0 };
    }
    (past as f32 / span as f32).clamp(0.0, 1.0)
}

/// Quadratic acceleration over [`TRIGGER_RAMP`]
pub fn ramp_factor(held: Duration) -> f32 {
    let progress = (held.as_secs_f32() / TRIGGER_RAMP.as_secs_f32()).clamp(0.0, 1.0);
    progress * progress
}

/// Signed wheel amount for one tick of trigger scrolling
///
/// The result never exceeds `BASE_SCROLL_PER_TICK * vertical_max_speed` in
/// magnitude, stays below it until [`TRIGGER_RAMP`] has passed and is zero
/// below the threshold.
pub fn trigger_scroll_amount(raw: i32, mapping: &TriggerMapping, held: Duration) -> i32 {
    if raw < mapping.threshold {
        return 0;
    }

    let max_speed = if mapping.scroll.vertical_max_speed > 0 {
        mapping.scroll.vertical_max_speed
    } else {
        FALLBACK_TRIGGER_MAX_SPEED
    } as f32;
    let ramp = ramp_factor(held);
    let mut cap = (BASE_SCROLL_PER_TICK * max_speed).round();
    // Full speed only once the ramp has completed
    if ramp < 1.0 {
        cap = (cap - 1.0).max(0.0);
    }

    let amount = BASE_SCROLL_PER_TICK
        * trigger_pressure(raw, mapping.threshold)
        * ramp
        * max_speed
        * mapping.scroll.vertical_sensitivity;

    amount.round().clamp(0.0, cap) as i32 * mapping.scroll.direction.sign()
}

/// Tracks when a trigger crossed its threshold
#[derive(Clone, Copy, Debug, Default)]
pub struct TriggerRamp {
    crossed_at: Option<Instant>,
}

impl TriggerRamp {
    /// How long the trigger has been held past `threshold`, or `None` below it
    pub fn update(&mut self, raw: i32, threshold: i32, now: Instant) -> Option<Duration> {
        if raw < threshold {
            self.crossed_at = None;
            return None;
        }
        let crossed_at = *self.crossed_at.get_or_insert(now);
        Some(now.saturating_duration_since(crossed_at))
    }

    pub fn reset(&mut self) {
        self.crossed_at = None;
    }

    pub fn is_active(&self) -> bool {
        self.crossed_at.is_some()
    }
}
