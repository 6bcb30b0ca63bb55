//! Monotonic timestamp source.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of UTC timestamps, in float seconds since the epoch.
///
/// The controller stamps every written row from an injected `Clock`, so
/// tests can supply a deterministic implementation.
pub trait Clock: Send + Sync {
    /// Returns the next timestamp.
    ///
    /// Implementations must return strictly increasing values across calls
    /// from the same instance.
    fn now_secs(&self) -> f64;
}

/// A wall-clock-backed clock that never repeats a value.
///
/// Each call returns a value strictly greater than every previous return,
/// even when the wall clock reports an equal or smaller reading. On
/// collision, the previous result is advanced to the next representable
/// `f64` above it; adding a fixed epsilon instead could round away at large
/// magnitudes.
///
/// History ordering and nearest-version-at-date queries both rely on this
/// strict total order. The state is one last-returned cell per instance:
/// two processes sharing a backend each get timestamps monotonic only
/// within themselves, so cross-process total ordering is not guaranteed.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<f64>,
}

impl MonotonicClock {
    /// Creates a new monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn wall_secs() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

impl Clock for MonotonicClock {
    fn now_secs(&self) -> f64 {
        let mut last = self.last.lock();
        let wall = Self::wall_secs();
        let next = if wall > *last { wall } else { next_up(*last) };
        *last = next;
        next
    }
}

/// Returns the smallest `f64` strictly greater than `x`.
///
/// Only valid for non-negative finite inputs, which is all a timestamp
/// can be.
fn next_up(x: f64) -> f64 {
    f64::from_bits(x.to_bits() + 1)
}

/// A deterministic clock for tests: starts at a fixed value and advances
/// by a fixed step on every call.
#[derive(Debug)]
pub struct StepClock {
    next: Mutex<f64>,
    step: f64,
}

impl StepClock {
    /// Creates a clock whose first reading is `start`, stepping by `step`.
    #[must_use]
    pub fn new(start: f64, step: f64) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for StepClock {
    fn now_secs(&self) -> f64 {
        let mut next = self.next.lock();
        let value = *next;
        *next += self.step;
        value
    }
}
