//! Log collection for host diagnostics and guest messages.
//!
//! Structured diagnostics go through `tracing`; this module keeps a bounded
//! in-memory copy that embedders can show to users.

mod collector;
mod event;

pub use collector::{LogCollector, DEFAULT_CAPACITY};
pub use event::{LogLevel, LogLine, LogSource};
