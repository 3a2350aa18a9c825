//! Tracing output for hosts embedding guestbridge.
//!
//! Settings live in the `logging` section of the bridge configuration and
//! can be overridden from the environment:
//!
//! ```ignore
//! use guestbridge_runtime::observability::init_tracing;
//!
//! let config = BridgeConfig::from_file("bridge.yaml")?.with_env_overrides()?;
//! init_tracing(&config.logging)?;
//! ```

mod settings;
mod subscriber;

pub use settings::{LogFormat, LogSettings};
pub use subscriber::init_tracing;
