//! Providers for host services the bridge depends on.

mod clock;

pub use clock::{ClockProvider, MockClock, RealClock};
