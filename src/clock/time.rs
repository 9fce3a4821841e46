//! Time sources for the software timer path of the beat clock.
//!
//! The clock never reads the system clock directly. It asks a [`TimeSource`]
//! for a monotonic millisecond reading, so tests can drive time by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic millisecond clock.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since an arbitrary fixed epoch. Must never decrease.
    fn now_ms(&self) -> f64;
}

/// Wall-clock time source backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTime {
    epoch: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven time source. Stores the current reading as `f64` bits.
#[derive(Debug, Default)]
pub struct ManualTime {
    bits: AtomicU64,
}

impl ManualTime {
    /// Create a manual clock reading `start_ms`.
    pub fn new(start_ms: f64) -> Self {
        Self {
            bits: AtomicU64::new(start_ms.to_bits()),
        }
    }

    /// Jump to an absolute reading. Readings earlier than the current one are ignored.
    pub fn set_ms(&self, ms: f64) {
        if ms >= self.now_ms() {
            self.bits.store(ms.to_bits(), Ordering::Release);
        }
    }

    /// Move time forward by `delta_ms` (negative deltas are ignored).
    pub fn advance_ms(&self, delta_ms: f64) {
        if delta_ms > 0.0 {
            self.set_ms(self.now_ms() + delta_ms);
        }
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
