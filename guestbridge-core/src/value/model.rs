//! Host type descriptors and their classification for guest interchange.
//!
//! Classification is tiered. Every primitive is also a memory scalar, and
//! every memory scalar is also an ABI argument:
//!
//! | Tier            | Members                                           |
//! |-----------------|---------------------------------------------------|
//! | `Primitive`     | i32, i64, f32, f64                                |
//! | `MemoryScalar`  | primitives, enums over i32/i64, guest pointers    |
//! | `AbiArgument`   | memory scalars, strings, vectors (1-4), colors    |
//!
//! The tier decides the marshalling path: direct slot, memory copy, or
//! allocate and encode.

use super::kind::{EnumRepr, ScalarKind, ValKind};
use crate::types::{Color, ElementKind, GuestPtr, Vector, VectorElement, MAX_DIMENSIONS};

/// Describes a host type crossing into the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostType {
    /// A native scalar.
    Scalar(ScalarKind),
    /// An enum with the given representation.
    Enum(EnumRepr),
    /// A guest pointer.
    Pointer,
    /// A text string, passed by pointer.
    String,
    /// A numeric vector, passed by pointer.
    Vector {
        /// Element type.
        element: ElementKind,
        /// Number of components.
        dims: u8,
    },
    /// An RGBA color record, passed by pointer.
    Color,
    /// Anything else. The name is kept for diagnostics.
    Opaque(&'static str),
}

/// Classification tier, ordered from least to most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueClass {
    /// Cannot cross into the guest.
    Invalid,
    /// Needs the guest allocator.
    AbiArgument,
    /// Fits directly in guest memory.
    MemoryScalar,
    /// Passes through a call slot unchanged.
    Primitive,
}

impl HostType {
    /// Classify this type.
    #[must_use]
    pub fn classify(&self) -> ValueClass {
        match self {
            Self::Scalar(kind) if kind.as_primitive().is_some() => ValueClass::Primitive,
            Self::Enum(repr) if repr.is_primitive() => ValueClass::MemoryScalar,
            Self::Pointer => ValueClass::MemoryScalar,
            Self::String | Self::Color => ValueClass::AbiArgument,
            Self::Vector { dims, .. } if (1..=MAX_DIMENSIONS).contains(&usize::from(*dims)) => {
                ValueClass::AbiArgument
            }
            _ => ValueClass::Invalid,
        }
    }

    /// Valid primitive.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.classify() >= ValueClass::Primitive
    }

    /// Valid memory scalar.
    #[must_use]
    pub fn is_memory_scalar(&self) -> bool {
        self.classify() >= ValueClass::MemoryScalar
    }

    /// Valid ABI argument.
    #[must_use]
    pub fn is_abi_argument(&self) -> bool {
        self.classify() >= ValueClass::AbiArgument
    }

    /// Slot kind used when deriving an export signature.
    ///
    /// Enums use their representation's slot; everything that is not a
    /// primitive travels as a pointer-sized `i32`.
    #[must_use]
    pub fn abi_slot(&self) -> ValKind {
        match self {
            Self::Scalar(kind) => kind.as_primitive().unwrap_or(ValKind::I32),
            Self::Enum(repr) => repr.slot().unwrap_or(ValKind::I32),
            _ => ValKind::I32,
        }
    }
}

/// Types with a static host type descriptor.
pub trait HostTyped {
    /// Descriptor for this type.
    const HOST_TYPE: HostType;
}

macro_rules! impl_host_typed_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(impl HostTyped for $ty {
            const HOST_TYPE: HostType = HostType::Scalar(ScalarKind::$kind);
        })*
    };
}

impl_host_typed_scalar!(
    i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32, u32 => U32,
    i64 => I64, u64 => U64, f32 => F32, f64 => F64,
);

impl HostTyped for GuestPtr {
    const HOST_TYPE: HostType = HostType::Pointer;
}

impl HostTyped for String {
    const HOST_TYPE: HostType = HostType::String;
}

impl HostTyped for &str {
    const HOST_TYPE: HostType = HostType::String;
}

impl HostTyped for Color {
    const HOST_TYPE: HostType = HostType::Color;
}

impl<T: VectorElement, const N: usize> HostTyped for Vector<T, N> {
    const HOST_TYPE: HostType = HostType::Vector {
        element: T::KIND,
        // 0 marks an unsupported width; a plain cast would wrap.
        dims: if N <= MAX_DIMENSIONS { N as u8 } else { 0 },
    };
}

impl HostTyped for bool {
    const HOST_TYPE: HostType = HostType::Opaque("bool");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Float3, Int4};

    #[test]
    fn primitives_are_valid_at_every_tier() {
        for ty in [
            i32::HOST_TYPE,
            i64::HOST_TYPE,
            f32::HOST_TYPE,
            f64::HOST_TYPE,
        ] {
            assert!(ty.is_primitive());
            assert!(ty.is_memory_scalar());
            assert!(ty.is_abi_argument());
        }
    }

    #[test]
    fn narrow_scalars_are_invalid() {
        for ty in [u8::HOST_TYPE, i16::HOST_TYPE, u64::HOST_TYPE, bool::HOST_TYPE] {
            assert_eq!(ty.classify(), ValueClass::Invalid);
        }
    }

    #[test]
    fn enums_need_a_primitive_repr() {
        assert_eq!(
            HostType::Enum(EnumRepr::I32).classify(),
            ValueClass::MemoryScalar
        );
        assert_eq!(
            HostType::Enum(EnumRepr::I64).classify(),
            ValueClass::MemoryScalar
        );
        assert_eq!(HostType::Enum(EnumRepr::U8).classify(), ValueClass::Invalid);
        assert_eq!(HostType::Enum(EnumRepr::U128).classify(), ValueClass::Invalid);
    }

    #[test]
    fn abi_only_types() {
        for ty in [String::HOST_TYPE, Color::HOST_TYPE, Float3::HOST_TYPE, Int4::HOST_TYPE] {
            assert_eq!(ty.classify(), ValueClass::AbiArgument);
            assert!(!ty.is_memory_scalar());
        }
        assert_eq!(
            Vector::<f32, 5>::HOST_TYPE.classify(),
            ValueClass::Invalid
        );
    }

    #[test]
    fn signature_slots() {
        assert_eq!(f64::HOST_TYPE.abi_slot(), ValKind::F64);
        assert_eq!(HostType::Enum(EnumRepr::U64).abi_slot(), ValKind::I64);
        assert_eq!(HostType::Enum(EnumRepr::I8).abi_slot(), ValKind::I32);
        assert_eq!(String::HOST_TYPE.abi_slot(), ValKind::I32);
        assert_eq!(GuestPtr::HOST_TYPE.abi_slot(), ValKind::I32);
    }
}
