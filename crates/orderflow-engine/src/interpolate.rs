//! Eased transitions for displayed numbers.
//!
//! Turns discrete jumps (a new rate, a new balance) into a short animation.
//! Retargeting mid-animation restarts from the value currently on screen so
//! the display never jumps.
//!
//! Time is `tokio::time::Instant`, so paused test clocks drive animations.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::Instant;

/// Cubic ease-out on `t` in `[0, 1]`; values outside are clamped.
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

fn lerp(from: Decimal, to: Decimal, progress: f64) -> Decimal {
    let weight = Decimal::try_from(progress).unwrap_or(Decimal::ONE);
    from + (to - from) * weight
}

/// `count` eased frames from `from` (exclusive) to `to` (inclusive).
///
/// The last frame is exactly `to`. A count of zero yields just `[to]`.
pub fn frames(from: Decimal, to: Decimal, count: usize) -> Vec<Decimal> {
    if count == 0 {
        return vec![to];
    }
    let mut out: Vec<Decimal> = (1..count)
        .map(|i| lerp(from, to, ease_out_cubic(i as f64 / count as f64)))
        .collect();
    out.push(to);
    out
}

/// A value animating toward a target over a fixed duration.
#[derive(Debug, Clone)]
pub struct AnimatedValue {
    from: Decimal,
    to: Decimal,
    started: Instant,
    duration: Duration,
}

impl AnimatedValue {
    /// Settled at `initial`.
    pub fn new(initial: Decimal, duration: Duration) -> Self {
        Self {
            from: initial,
            to: initial,
            started: Instant::now(),
            duration,
        }
    }

    pub fn target(&self) -> Decimal {
        self.to
    }

    /// Displayed value at `now`.
    pub fn value_at(&self, now: Instant) -> Decimal {
        let elapsed = now.saturating_duration_since(self.started);
        if self.duration.is_zero() || elapsed >= self.duration {
            return self.to;
        }
        let progress = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        lerp(self.from, self.to, ease_out_cubic(progress))
    }

    /// Animate toward `target`, starting from whatever is displayed at `now`.
    pub fn set_target(&mut self, target: Decimal, now: Instant) {
        self.from = self.value_at(now);
        self.to = target;
        self.started = now;
    }

    pub fn is_settled(&self, now: Instant) -> bool {
        self.value_at(now) == self.to
    }
}
