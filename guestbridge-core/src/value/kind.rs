//! WASM value kinds and host scalar kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value kind the WASM engine can pass through a call slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValKind {
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl ValKind {
    /// Zero value of this kind.
    #[must_use]
    pub fn zero(self) -> WasmValue {
        match self {
            Self::I32 => WasmValue::I32(0),
            Self::I64 => WasmValue::I64(0),
            Self::F32 => WasmValue::F32(0.0),
            Self::F64 => WasmValue::F64(0.0),
        }
    }
}

impl fmt::Display for ValKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A value placed in a call slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum WasmValue {
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
}

impl WasmValue {
    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValKind {
        match self {
            Self::I32(_) => ValKind::I32,
            Self::I64(_) => ValKind::I64,
            Self::F32(_) => ValKind::F32,
            Self::F64(_) => ValKind::F64,
        }
    }

    /// Parse a literal of the given kind, as typed on a command line.
    #[must_use]
    pub fn parse(kind: ValKind, text: &str) -> Option<Self> {
        match kind {
            ValKind::I32 => text.parse().ok().map(Self::I32),
            ValKind::I64 => text.parse().ok().map(Self::I64),
            ValKind::F32 => text.parse().ok().map(Self::F32),
            ValKind::F64 => text.parse().ok().map(Self::F64),
        }
    }
}

impl fmt::Display for WasmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}: i32"),
            Self::I64(v) => write!(f, "{v}: i64"),
            Self::F32(v) => write!(f, "{v}: f32"),
            Self::F64(v) => write!(f, "{v}: f64"),
        }
    }
}

/// A native host scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `i8`
    I8,
    /// `u8`
    U8,
    /// `i16`
    I16,
    /// `u16`
    U16,
    /// `i32`
    I32,
    /// `u32`
    U32,
    /// `i64`
    I64,
    /// `u64`
    U64,
    /// `f32`
    F32,
    /// `f64`
    F64,
}

impl ScalarKind {
    /// The WASM kind this scalar passes through unchanged, if any.
    #[must_use]
    pub const fn as_primitive(self) -> Option<ValKind> {
        match self {
            Self::I32 => Some(ValKind::I32),
            Self::I64 => Some(ValKind::I64),
            Self::F32 => Some(ValKind::F32),
            Self::F64 => Some(ValKind::F64),
            _ => None,
        }
    }
}

/// Underlying integer representation of an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumRepr {
    /// `i8`
    I8,
    /// `u8`
    U8,
    /// `i16`
    I16,
    /// `u16`
    U16,
    /// `i32`
    I32,
    /// `u32`
    U32,
    /// `i64`
    I64,
    /// `u64`
    U64,
    /// `i128`, never representable in a slot.
    I128,
    /// `u128`, never representable in a slot.
    U128,
}

impl EnumRepr {
    /// Slot kind the representation travels in, `None` for 128-bit reprs.
    #[must_use]
    pub const fn slot(self) -> Option<ValKind> {
        match self {
            Self::I8 | Self::U8 | Self::I16 | Self::U16 | Self::I32 | Self::U32 => {
                Some(ValKind::I32)
            }
            Self::I64 | Self::U64 => Some(ValKind::I64),
            Self::I128 | Self::U128 => None,
        }
    }

    /// Whether the representation is itself a primitive WASM kind.
    #[must_use]
    pub const fn is_primitive(self) -> bool {
        matches!(self, Self::I32 | Self::I64)
    }
}

/// Integer types usable as an enum representation.
pub trait ReprInt: Copy {
    /// Matching representation tag.
    const REPR: EnumRepr;
}

macro_rules! impl_repr_int {
    ($($ty:ty => $repr:ident),* $(,)?) => {
        $(impl ReprInt for $ty {
            const REPR: EnumRepr = EnumRepr::$repr;
        })*
    };
}

impl_repr_int!(
    i8 => I8, u8 => U8, i16 => I16, u16 => U16, i32 => I32, u32 => U32,
    i64 => I64, u64 => U64, i128 => I128, u128 => U128,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_repr_slots() {
        assert_eq!(EnumRepr::U8.slot(), Some(ValKind::I32));
        assert_eq!(EnumRepr::U64.slot(), Some(ValKind::I64));
        assert_eq!(EnumRepr::I128.slot(), None);
        assert!(EnumRepr::I32.is_primitive());
        assert!(!EnumRepr::U16.is_primitive());
    }

    #[test]
    fn parse_literals() {
        assert_eq!(WasmValue::parse(ValKind::I32, "-5"), Some(WasmValue::I32(-5)));
        assert_eq!(WasmValue::parse(ValKind::F64, "2.5"), Some(WasmValue::F64(2.5)));
        assert_eq!(WasmValue::parse(ValKind::I64, "x"), None);
    }
}
