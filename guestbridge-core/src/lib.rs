//! guestbridge core library
//!
//! Engine-independent building blocks for hosting WebAssembly guests:
//!
//! - **Types**: guest pointers, string formats, vectors and color records
//! - **Value model**: host type descriptors, classification tiers and
//!   exact-width boxed values
//! - **Errors**: a numbered error taxonomy shared by every guestbridge crate
//! - **Logging**: a bounded, pausable collector for host and guest messages
//!
//! The WASM engine itself lives in `guestbridge-runtime`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod logging;
pub mod prelude;
pub mod providers;
pub mod types;
pub mod value;

pub use error::{BridgeError, ErrorClass, Result};
pub use types::{Color, ColorProfile, GuestPtr, StringFormat, Vector, VectorValue};
pub use value::{HostType, HostValue, ValKind, ValueClass, WasmValue};
