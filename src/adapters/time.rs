//! Host time adapter.
//!
//! Wraps `embassy_time::Instant` so that `last_changed` stamps and revert
//! deadlines come from the same time base as the runtime's timers.

use embassy_time::Instant;

use crate::app::ports::Clock;

/// Milliseconds since the adapter was created (monotonic).
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since start.
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.uptime_ms()
    }
}
