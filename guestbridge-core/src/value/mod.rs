//! Value model for host/guest interchange.
//!
//! - `kind`: WASM slot kinds and host scalar/enum representations
//! - `model`: `HostType` descriptors and tiered classification
//! - `boxed`: exact-width cells and `HostValue`

mod boxed;
mod kind;
mod model;

pub use boxed::{repr_of, Boxed, GuestEnum, HostValue, ToHostValue};
pub use kind::{EnumRepr, ReprInt, ScalarKind, ValKind, WasmValue};
pub use model::{HostType, HostTyped, ValueClass};
