use std::time::{Duration, Instant};

/// Measures the time between ticks
///
/// Gaps longer than `max_dt` (a stalled loop, a suspended machine) are replaced
/// by `default_dt` so cursor motion never jumps.
#[derive(Clone, Debug)]
pub struct FrameClock {
    last: Option<Instant>,
    max_dt: f32,
    default_dt: f32,
}

impl FrameClock {
    pub fn new(max_dt: f32, default_dt: f32) -> Self {
        Self {
            last: None,
            max_dt,
            default_dt,
        }
    }

    /// Seconds since the previous call
    pub fn delta(&mut self, now: Instant) -> f32 {
        let dt = match self.last {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => self.default_dt,
        };
        self.last = Some(now);
        if dt > self.max_dt {
            self.default_dt
        } else {
            dt
        }
    }
}

/// Lets an event through at most once per interval
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_event: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_event: None,
        }
    }

    pub fn should_process(&mut self, now: Instant) -> bool {
        match self.last_event {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last_event = Some(now);
                true
            }
        }
    }
}
