//! Core types shared between the host and the guest ABI.
//!
//! - `GuestPtr`: offset into guest linear memory
//! - `StringFormat`: negotiated string encoding
//! - `Vector` / `VectorValue`: fixed-dimension numeric vectors
//! - `Color` / `ColorProfile`: RGBA color record with a profile tag

mod color;
mod format;
mod pointer;
mod vector;

pub use color::{Color, ColorProfile, COLOR_RECORD_SIZE};
pub use format::StringFormat;
pub use pointer::GuestPtr;
pub use vector::{
    Bool2, Bool3, Bool4, Components, Double2, Double3, Double4, ElementKind, Float2, Float3,
    Float4, Int2, Int3, Int4, Long2, Long3, Long4, Vector, VectorElement, VectorValue,
    MAX_DIMENSIONS, SCRATCH_BYTES,
};
