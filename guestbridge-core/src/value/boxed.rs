//! Exact-width value cells and host values awaiting marshalling.

use super::kind::{EnumRepr, ReprInt, ScalarKind, ValKind, WasmValue};
use super::model::{HostType, HostTyped};
use crate::types::{Color, GuestPtr, Vector, VectorElement, VectorValue};

/// A scalar boxed at its own width.
///
/// Narrow integers keep their width here; widening happens only when the
/// cell is placed into a call slot of a known kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boxed {
    /// `i8`
    I8(i8),
    /// `u8`
    U8(u8),
    /// `i16`
    I16(i16),
    /// `u16`
    U16(u16),
    /// `i32`
    I32(i32),
    /// `u32`
    U32(u32),
    /// `i64`
    I64(i64),
    /// `u64`
    U64(u64),
    /// `f32`
    F32(f32),
    /// `f64`
    F64(f64),
}

impl Boxed {
    /// Width of the boxed representation in bits.
    #[must_use]
    pub const fn width_bits(&self) -> u32 {
        match self {
            Self::I8(_) | Self::U8(_) => 8,
            Self::I16(_) | Self::U16(_) => 16,
            Self::I32(_) | Self::U32(_) | Self::F32(_) => 32,
            Self::I64(_) | Self::U64(_) | Self::F64(_) => 64,
        }
    }

    /// Box an enum discriminant at the width of its representation.
    ///
    /// Returns `None` for 128-bit representations.
    #[must_use]
    pub fn from_enum(repr: EnumRepr, raw: i128) -> Option<Self> {
        let boxed = match repr {
            EnumRepr::I8 => Self::I8(raw as i8),
            EnumRepr::U8 => Self::U8(raw as u8),
            EnumRepr::I16 => Self::I16(raw as i16),
            EnumRepr::U16 => Self::U16(raw as u16),
            EnumRepr::I32 => Self::I32(raw as i32),
            EnumRepr::U32 => Self::U32(raw as u32),
            EnumRepr::I64 => Self::I64(raw as i64),
            EnumRepr::U64 => Self::U64(raw as u64),
            EnumRepr::I128 | EnumRepr::U128 => return None,
        };
        Some(boxed)
    }

    /// Place the cell into a slot of kind `slot`.
    ///
    /// Signed cells sign-extend, unsigned cells zero-extend. Unsigned
    /// 32/64-bit values keep their bit pattern. Floats only fit their own
    /// kind, and 64-bit integers never narrow.
    #[must_use]
    pub fn to_slot(self, slot: ValKind) -> Option<WasmValue> {
        let value = match (self, slot) {
            (Self::I8(v), ValKind::I32) => WasmValue::I32(i32::from(v)),
            (Self::U8(v), ValKind::I32) => WasmValue::I32(i32::from(v)),
            (Self::I16(v), ValKind::I32) => WasmValue::I32(i32::from(v)),
            (Self::U16(v), ValKind::I32) => WasmValue::I32(i32::from(v)),
            (Self::I32(v), ValKind::I32) => WasmValue::I32(v),
            (Self::U32(v), ValKind::I32) => WasmValue::I32(v as i32),
            (Self::I8(v), ValKind::I64) => WasmValue::I64(i64::from(v)),
            (Self::U8(v), ValKind::I64) => WasmValue::I64(i64::from(v)),
            (Self::I16(v), ValKind::I64) => WasmValue::I64(i64::from(v)),
            (Self::U16(v), ValKind::I64) => WasmValue::I64(i64::from(v)),
            (Self::I32(v), ValKind::I64) => WasmValue::I64(i64::from(v)),
            (Self::U32(v), ValKind::I64) => WasmValue::I64(i64::from(v)),
            (Self::I64(v), ValKind::I64) => WasmValue::I64(v),
            (Self::U64(v), ValKind::I64) => WasmValue::I64(v as i64),
            (Self::F32(v), ValKind::F32) => WasmValue::F32(v),
            (Self::F64(v), ValKind::F64) => WasmValue::F64(v),
            _ => return None,
        };
        Some(value)
    }
}

impl From<WasmValue> for Boxed {
    fn from(value: WasmValue) -> Self {
        match value {
            WasmValue::I32(v) => Self::I32(v),
            WasmValue::I64(v) => Self::I64(v),
            WasmValue::F32(v) => Self::F32(v),
            WasmValue::F64(v) => Self::F64(v),
        }
    }
}

/// A host value on its way into a call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// Native scalar, passed as is.
    Scalar(Boxed),
    /// Enum discriminant with its representation.
    Enum {
        /// Underlying integer representation.
        repr: EnumRepr,
        /// Discriminant value.
        raw: i128,
    },
    /// Guest pointer, passed as an `i32`.
    Pointer(GuestPtr),
    /// String, allocated in the guest.
    String(String),
    /// Vector, allocated in the guest.
    Vector(VectorValue),
    /// Color record, allocated in the guest.
    Color(Color),
    /// A shape the marshalling layer has no path for.
    Opaque(&'static str),
}

/// Conversion into a [`HostValue`].
pub trait ToHostValue: HostTyped {
    /// Describe this value for marshalling.
    fn to_host_value(&self) -> HostValue;
}

macro_rules! impl_to_host_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl ToHostValue for $ty {
            fn to_host_value(&self) -> HostValue {
                HostValue::Scalar(Boxed::$variant(*self))
            }
        })*
    };
}

impl_to_host_scalar!(
    i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32, u32 => U32,
    i64 => I64, u64 => U64, f32 => F32, f64 => F64,
);

impl ToHostValue for GuestPtr {
    fn to_host_value(&self) -> HostValue {
        HostValue::Pointer(*self)
    }
}

impl ToHostValue for String {
    fn to_host_value(&self) -> HostValue {
        HostValue::String(self.clone())
    }
}

impl ToHostValue for &str {
    fn to_host_value(&self) -> HostValue {
        HostValue::String((*self).to_owned())
    }
}

impl ToHostValue for Color {
    fn to_host_value(&self) -> HostValue {
        HostValue::Color(*self)
    }
}

impl<T: VectorElement, const N: usize> ToHostValue for Vector<T, N> {
    fn to_host_value(&self) -> HostValue {
        self.to_value()
            .map_or(HostValue::Opaque("vector"), HostValue::Vector)
    }
}

impl ToHostValue for bool {
    fn to_host_value(&self) -> HostValue {
        HostValue::Opaque("bool")
    }
}

/// An enum that crosses into the guest as its discriminant.
///
/// Implement it with [`guest_enum!`](crate::guest_enum).
pub trait GuestEnum: Copy {
    /// Underlying representation.
    const REPR: EnumRepr;

    /// Discriminant widened to `i128`.
    fn discriminant(self) -> i128;
}

/// Representation tag of an integer type.
#[must_use]
pub const fn repr_of<T: ReprInt>() -> EnumRepr {
    T::REPR
}

/// Declare a fieldless enum that can be passed to guest functions.
///
/// ```
/// use guestbridge_core::guest_enum;
///
/// guest_enum! {
///     #[derive(Debug, PartialEq)]
///     pub enum Mode: u8 {
///         Idle = 0,
///         Run = 1,
///     }
/// }
/// ```
#[macro_export]
macro_rules! guest_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        #[repr($repr)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value),*
        }

        impl $crate::value::GuestEnum for $name {
            const REPR: $crate::value::EnumRepr = $crate::value::repr_of::<$repr>();

            fn discriminant(self) -> i128 {
                self as $repr as i128
            }
        }

        impl $crate::value::HostTyped for $name {
            const HOST_TYPE: $crate::value::HostType =
                $crate::value::HostType::Enum($crate::value::repr_of::<$repr>());
        }

        impl $crate::value::ToHostValue for $name {
            fn to_host_value(&self) -> $crate::value::HostValue {
                $crate::value::HostValue::Enum {
                    repr: <Self as $crate::value::GuestEnum>::REPR,
                    raw: $crate::value::GuestEnum::discriminant(*self),
                }
            }
        }
    };
}

impl HostValue {
    /// Descriptor of the value's shape.
    #[must_use]
    pub fn host_type(&self) -> HostType {
        match self {
            Self::Scalar(boxed) => HostType::Scalar(match boxed {
                Boxed::I8(_) => ScalarKind::I8,
                Boxed::U8(_) => ScalarKind::U8,
                Boxed::I16(_) => ScalarKind::I16,
                Boxed::U16(_) => ScalarKind::U16,
                Boxed::I32(_) => ScalarKind::I32,
                Boxed::U32(_) => ScalarKind::U32,
                Boxed::I64(_) => ScalarKind::I64,
                Boxed::U64(_) => ScalarKind::U64,
                Boxed::F32(_) => ScalarKind::F32,
                Boxed::F64(_) => ScalarKind::F64,
            }),
            Self::Enum { repr, .. } => HostType::Enum(*repr),
            Self::Pointer(_) => HostType::Pointer,
            Self::String(_) => HostType::String,
            Self::Vector(v) => HostType::Vector {
                element: v.element(),
                dims: v.dims() as u8,
            },
            Self::Color(_) => HostType::Color,
            Self::Opaque(name) => HostType::Opaque(*name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::guest_enum! {
        #[derive(Debug, PartialEq)]
        enum Small: u8 {
            Low = 1,
            High = 200,
        }
    }

    crate::guest_enum! {
        enum Signed: i16 {
            Minus = -3,
        }
    }

    #[test]
    fn enums_box_at_their_width() {
        assert_eq!(
            Small::High.to_host_value(),
            HostValue::Enum {
                repr: EnumRepr::U8,
                raw: 200
            }
        );
        assert_eq!(Boxed::from_enum(EnumRepr::U8, 200), Some(Boxed::U8(200)));
        assert_eq!(Boxed::from_enum(EnumRepr::I16, -3), Some(Boxed::I16(-3)));
        assert_eq!(Boxed::from_enum(EnumRepr::U64, 9), Some(Boxed::U64(9)));
        assert_eq!(Boxed::from_enum(EnumRepr::U8, 1).map(|b| b.width_bits()), Some(8));
    }

    #[test]
    fn every_width_has_a_cell() {
        let widths = [
            (EnumRepr::I8, 8),
            (EnumRepr::U8, 8),
            (EnumRepr::I16, 16),
            (EnumRepr::U16, 16),
            (EnumRepr::I32, 32),
            (EnumRepr::U32, 32),
            (EnumRepr::I64, 64),
            (EnumRepr::U64, 64),
        ];
        for (repr, bits) in widths {
            let boxed = Boxed::from_enum(repr, 1).unwrap();
            assert_eq!(boxed.width_bits(), bits, "{repr:?}");
        }
    }

    #[test]
    fn wide_enums_are_rejected() {
        assert_eq!(repr_of::<u128>(), EnumRepr::U128);
        assert_eq!(Boxed::from_enum(EnumRepr::U128, 7), None);
        assert_eq!(Boxed::from_enum(EnumRepr::I128, 7), None);
    }

    #[test]
    fn slot_placement_extends() {
        let minus = Boxed::from_enum(Signed::REPR, Signed::Minus.discriminant()).unwrap();
        assert_eq!(minus.to_slot(ValKind::I32), Some(WasmValue::I32(-3)));
        assert_eq!(Boxed::U8(200).to_slot(ValKind::I32), Some(WasmValue::I32(200)));
        assert_eq!(Boxed::U32(u32::MAX).to_slot(ValKind::I64), Some(WasmValue::I64(4_294_967_295)));
        assert_eq!(Boxed::I64(1).to_slot(ValKind::I32), None);
        assert_eq!(Boxed::F32(1.0).to_slot(ValKind::F64), None);
    }

    #[test]
    fn host_types_round_trip() {
        assert_eq!(
            Small::Low.to_host_value().host_type(),
            HostType::Enum(EnumRepr::U8)
        );
        assert_eq!(3i32.to_host_value().host_type(), i32::HOST_TYPE);
        assert_eq!("x".to_host_value().host_type(), HostType::String);
    }
}
