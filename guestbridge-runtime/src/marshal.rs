//! Argument boxing and call-slot conversion.
//!
//! Host arguments are first described as [`HostValue`]s, boxed at their own
//! width, and only then placed into the slot kind the export declares.

use crate::abi::Abi;
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::types::GuestPtr;
use guestbridge_core::value::{Boxed, HostTyped, HostValue, ToHostValue, ValKind, WasmValue};
use std::fmt;
use wasmtime::{AsContextMut, FuncType, Val, ValType};

/// Parameter and result kinds of a function export.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Parameter kinds in order.
    pub params: Vec<ValKind>,
    /// Result kinds in order.
    pub results: Vec<ValKind>,
}

impl Signature {
    /// Create a signature.
    pub fn new(params: Vec<ValKind>, results: Vec<ValKind>) -> Self {
        Self { params, results }
    }

    /// Read a signature off an engine function type.
    ///
    /// `None` when any parameter or result is not a numeric kind.
    pub fn of_func_type(ty: &FuncType) -> Option<Self> {
        let params = ty.params().map(|p| val_kind(&p)).collect::<Option<Vec<_>>>()?;
        let results = ty.results().map(|r| val_kind(&r)).collect::<Option<Vec<_>>>()?;
        Some(Self { params, results })
    }

    /// Whether `ty` has exactly this signature.
    pub fn matches(&self, ty: &FuncType) -> bool {
        Self::of_func_type(ty).is_some_and(|actual| &actual == self)
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, kind) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}")?;
        }
        f.write_str(")")?;
        match self.results.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " -> {single}"),
            many => {
                f.write_str(" -> (")?;
                for (i, kind) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{kind}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Numeric kind of an engine value type.
pub(crate) fn val_kind(ty: &ValType) -> Option<ValKind> {
    match ty {
        ValType::I32 => Some(ValKind::I32),
        ValType::I64 => Some(ValKind::I64),
        ValType::F32 => Some(ValKind::F32),
        ValType::F64 => Some(ValKind::F64),
        _ => None,
    }
}

pub(crate) fn to_val(value: WasmValue) -> Val {
    match value {
        WasmValue::I32(v) => Val::I32(v),
        WasmValue::I64(v) => Val::I64(v),
        WasmValue::F32(v) => Val::from(v),
        WasmValue::F64(v) => Val::from(v),
    }
}

pub(crate) fn from_val(value: &Val) -> Option<WasmValue> {
    match value {
        Val::I32(v) => Some(WasmValue::I32(*v)),
        Val::I64(v) => Some(WasmValue::I64(*v)),
        Val::F32(_) => value.f32().map(WasmValue::F32),
        Val::F64(_) => value.f64().map(WasmValue::F64),
        _ => None,
    }
}

/// Box one host argument.
///
/// Strings, vectors and colors are allocated through `abi`. Without an ABI,
/// or when the guest allocator refuses, they box to the failed-allocation
/// sentinel and the call still goes ahead. Unknown shapes are a contract
/// violation.
pub fn box_argument(store: impl AsContextMut, abi: Option<&Abi>, value: &HostValue) -> Result<Boxed> {
    match value {
        HostValue::Scalar(boxed) => Ok(*boxed),
        HostValue::Enum { repr, raw } => Boxed::from_enum(*repr, *raw).ok_or_else(|| {
            BridgeError::contract(format!("enum representation {repr:?} has no call slot"))
        }),
        HostValue::Pointer(ptr) => Ok(Boxed::I32(ptr.as_i32())),
        HostValue::String(_) | HostValue::Vector(_) | HostValue::Color(_) => {
            let Some(abi) = abi else {
                tracing::debug!(shape = ?value.host_type(), "No guest ABI, passing null argument");
                return Ok(Boxed::I32(GuestPtr::ALLOC_FAILED));
            };
            match abi.alloc_value(store, value) {
                Ok(ptr) => Ok(Boxed::I32(ptr.as_i32())),
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "Argument allocation failed, passing null argument");
                    Ok(Boxed::I32(GuestPtr::ALLOC_FAILED))
                }
            }
        }
        HostValue::Opaque(name) => Err(BridgeError::contract(format!(
            "value of type '{name}' cannot be passed to a guest"
        ))),
    }
}

/// Arguments of a guest call.
pub trait GuestArgs {
    /// Describe each argument for marshalling.
    fn host_values(&self) -> Vec<HostValue>;
}

/// Arguments whose slot kinds are known from their host types.
pub trait StaticArgs: GuestArgs {
    /// Slot kind of each parameter.
    fn param_kinds() -> Vec<ValKind>;
}

impl GuestArgs for () {
    fn host_values(&self) -> Vec<HostValue> {
        Vec::new()
    }
}

impl StaticArgs for () {
    fn param_kinds() -> Vec<ValKind> {
        Vec::new()
    }
}

macro_rules! impl_tuple_args {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: ToHostValue),+> GuestArgs for ($($name,)+) {
            fn host_values(&self) -> Vec<HostValue> {
                vec![$(self.$idx.to_host_value()),+]
            }
        }

        impl<$($name: ToHostValue),+> StaticArgs for ($($name,)+) {
            fn param_kinds() -> Vec<ValKind> {
                vec![$(<$name as HostTyped>::HOST_TYPE.abi_slot()),+]
            }
        }
    };
}

impl_tuple_args!(A: 0);
impl_tuple_args!(A: 0, B: 1);
impl_tuple_args!(A: 0, B: 1, C: 2);
impl_tuple_args!(A: 0, B: 1, C: 2, D: 3);

impl<const N: usize> GuestArgs for [WasmValue; N] {
    fn host_values(&self) -> Vec<HostValue> {
        self.iter()
            .map(|v| HostValue::Scalar(Boxed::from(*v)))
            .collect()
    }
}

/// Conversion from call results.
pub trait GuestReturn: Sized {
    /// Convert raw results, `None` when they do not fit.
    fn from_results(results: &[WasmValue]) -> Option<Self>;
}

/// Return types whose result kinds are known statically.
pub trait StaticReturn: GuestReturn {
    /// Result kinds, empty for actions.
    fn result_kinds() -> Vec<ValKind>;
}

impl GuestReturn for () {
    fn from_results(results: &[WasmValue]) -> Option<Self> {
        results.is_empty().then_some(())
    }
}

impl StaticReturn for () {
    fn result_kinds() -> Vec<ValKind> {
        Vec::new()
    }
}

macro_rules! impl_scalar_return {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl GuestReturn for $ty {
                fn from_results(results: &[WasmValue]) -> Option<Self> {
                    match results {
                        [WasmValue::$variant(v)] => Some(*v),
                        _ => None,
                    }
                }
            }

            impl StaticReturn for $ty {
                fn result_kinds() -> Vec<ValKind> {
                    vec![ValKind::$variant]
                }
            }
        )*
    };
}

impl_scalar_return!(i32 => I32, i64 => I64, f32 => F32, f64 => F64);

impl GuestReturn for GuestPtr {
    fn from_results(results: &[WasmValue]) -> Option<Self> {
        i32::from_results(results).map(GuestPtr::new)
    }
}

impl StaticReturn for GuestPtr {
    fn result_kinds() -> Vec<ValKind> {
        vec![ValKind::I32]
    }
}

impl GuestReturn for WasmValue {
    fn from_results(results: &[WasmValue]) -> Option<Self> {
        match results {
            [value] => Some(*value),
            _ => None,
        }
    }
}
