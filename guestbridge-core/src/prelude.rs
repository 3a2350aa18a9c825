//! Prelude for convenient imports.
//!
//! ```
//! use guestbridge_core::prelude::*;
//! ```

// Core types
pub use crate::types::{
    Bool2, Bool3, Bool4, Color, ColorProfile, Double2, Double3, Double4, Float2, Float3, Float4,
    GuestPtr, Int2, Int3, Int4, Long2, Long3, Long4, StringFormat, Vector, VectorValue,
};

// Error handling
pub use crate::error::{BridgeError, ErrorClass, Result};

// Value model
pub use crate::value::{
    Boxed, EnumRepr, GuestEnum, HostType, HostTyped, HostValue, ToHostValue, ValKind, ValueClass,
    WasmValue,
};

// Logging
pub use crate::logging::{LogCollector, LogLevel, LogLine, LogSource};

// Providers
pub use crate::providers::{ClockProvider, MockClock, RealClock};

pub use crate::guest_enum;
