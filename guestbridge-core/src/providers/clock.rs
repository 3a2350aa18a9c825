//! Clock provider for time abstraction.
//!
//! The `curtime` import reports ticks since instance start from a
//! `ClockProvider`, so tests can substitute a clock they control.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Provider trait for monotonic time.
pub trait ClockProvider: Send + Sync {
    /// Monotonic nanoseconds since the provider was created.
    fn now(&self) -> u64;

    /// Advance time (mock-only operation). Real implementations do nothing.
    fn advance(&self, duration: Duration);

    /// Check if this is a mock clock.
    fn is_mock(&self) -> bool;
}

/// Real clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct RealClock {
    start: Instant,
}

impl RealClock {
    /// Create a new real clock.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockProvider for RealClock {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn advance(&self, _duration: Duration) {}

    fn is_mock(&self) -> bool {
        false
    }
}

/// Mock clock that only moves when told to.
#[derive(Debug, Default)]
pub struct MockClock {
    current_nanos: AtomicU64,
}

impl MockClock {
    /// Create a mock clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClockProvider for MockClock {
    fn now(&self) -> u64 {
        self.current_nanos.load(Ordering::SeqCst)
    }

    fn advance(&self, duration: Duration) {
        self.current_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    fn is_mock(&self) -> bool {
        true
    }
}
