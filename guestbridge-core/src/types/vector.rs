//! Fixed-dimension numeric vectors passed to the guest by pointer.

use std::fmt;

/// Largest supported vector dimension.
pub const MAX_DIMENSIONS: usize = 4;

/// Scratch space large enough for any encoded vector.
pub const SCRATCH_BYTES: usize = MAX_DIMENSIONS * 8;

/// Element type of a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// One byte per component, 0 or 1.
    Bool,
    /// Unsigned 64-bit.
    U64,
    /// Signed 64-bit.
    I64,
    /// Unsigned 32-bit.
    U32,
    /// Signed 32-bit.
    I32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl ElementKind {
    /// Encoded size of one component in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Bool => 1,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Up to four components of one element type, in declared order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Components<T> {
    values: [T; MAX_DIMENSIONS],
    dims: u8,
}

impl<T: VectorElement> Components<T> {
    /// Build from a slice of 1 to 4 components.
    #[must_use]
    pub fn new(values: &[T]) -> Option<Self> {
        if values.is_empty() || values.len() > MAX_DIMENSIONS {
            return None;
        }
        let mut buf = [T::default(); MAX_DIMENSIONS];
        buf[..values.len()].copy_from_slice(values);
        Some(Self {
            values: buf,
            dims: values.len() as u8,
        })
    }

    /// Components in declared order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.values[..self.dims as usize]
    }

    /// Number of components.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims as usize
    }

    fn encode_into(&self, out: &mut [u8]) -> usize {
        let size = T::KIND.size();
        for (i, value) in self.as_slice().iter().enumerate() {
            value.write_le(&mut out[i * size..(i + 1) * size]);
        }
        self.dims() * size
    }
}

/// A primitive that can be a vector component.
pub trait VectorElement: Copy + Default + PartialEq + fmt::Debug {
    /// Element kind tag.
    const KIND: ElementKind;

    /// Write little-endian bytes into `out` (exactly `KIND.size()` long).
    fn write_le(self, out: &mut [u8]);

    /// Wrap components into the type-erased value.
    fn wrap(components: Components<Self>) -> VectorValue;
}

macro_rules! impl_vector_element {
    ($ty:ty, $kind:ident) => {
        impl VectorElement for $ty {
            const KIND: ElementKind = ElementKind::$kind;

            fn write_le(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            fn wrap(components: Components<Self>) -> VectorValue {
                VectorValue::$kind(components)
            }
        }
    };
}

impl_vector_element!(u64, U64);
impl_vector_element!(i64, I64);
impl_vector_element!(u32, U32);
impl_vector_element!(i32, I32);
impl_vector_element!(f32, F32);
impl_vector_element!(f64, F64);

impl VectorElement for bool {
    const KIND: ElementKind = ElementKind::Bool;

    fn write_le(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn wrap(components: Components<Self>) -> VectorValue {
        VectorValue::Bool(components)
    }
}

/// A vector with its element type erased.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VectorValue {
    /// `bool` components.
    Bool(Components<bool>),
    /// `u64` components.
    U64(Components<u64>),
    /// `i64` components.
    I64(Components<i64>),
    /// `u32` components.
    U32(Components<u32>),
    /// `i32` components.
    I32(Components<i32>),
    /// `f32` components.
    F32(Components<f32>),
    /// `f64` components.
    F64(Components<f64>),
}

macro_rules! each_components {
    ($value:expr, $c:ident => $body:expr) => {
        match $value {
            VectorValue::Bool($c) => $body,
            VectorValue::U64($c) => $body,
            VectorValue::I64($c) => $body,
            VectorValue::U32($c) => $body,
            VectorValue::I32($c) => $body,
            VectorValue::F32($c) => $body,
            VectorValue::F64($c) => $body,
        }
    };
}

impl VectorValue {
    /// Element kind.
    #[must_use]
    pub fn element(&self) -> ElementKind {
        match self {
            Self::Bool(_) => ElementKind::Bool,
            Self::U64(_) => ElementKind::U64,
            Self::I64(_) => ElementKind::I64,
            Self::U32(_) => ElementKind::U32,
            Self::I32(_) => ElementKind::I32,
            Self::F32(_) => ElementKind::F32,
            Self::F64(_) => ElementKind::F64,
        }
    }

    /// Number of components.
    #[must_use]
    pub fn dims(&self) -> usize {
        each_components!(self, c => c.dims())
    }

    /// Exact encoded size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.element().size() * self.dims()
    }

    /// Encode components in declared order into a stack buffer.
    ///
    /// Returns the encoded prefix of `scratch`.
    pub fn encode<'a>(&self, scratch: &'a mut [u8; SCRATCH_BYTES]) -> &'a [u8] {
        let len = each_components!(self, c => c.encode_into(scratch));
        &scratch[..len]
    }
}

/// A statically sized vector, e.g. `Vector<f32, 3>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector<T, const N: usize>(pub [T; N]);

impl<T: VectorElement, const N: usize> Vector<T, N> {
    /// Create a vector from its components.
    #[must_use]
    pub const fn new(components: [T; N]) -> Self {
        Self(components)
    }

    /// Type-erased value, `None` unless `1 <= N <= 4`.
    #[must_use]
    pub fn to_value(&self) -> Option<VectorValue> {
        Components::new(&self.0).map(T::wrap)
    }
}

/// Two `f32` components.
pub type Float2 = Vector<f32, 2>;
/// Three `f32` components.
pub type Float3 = Vector<f32, 3>;
/// Four `f32` components.
pub type Float4 = Vector<f32, 4>;
/// Two `f64` components.
pub type Double2 = Vector<f64, 2>;
/// Three `f64` components.
pub type Double3 = Vector<f64, 3>;
/// Four `f64` components.
pub type Double4 = Vector<f64, 4>;
/// Two `i32` components.
pub type Int2 = Vector<i32, 2>;
/// Three `i32` components.
pub type Int3 = Vector<i32, 3>;
/// Four `i32` components.
pub type Int4 = Vector<i32, 4>;
/// Two `i64` components.
pub type Long2 = Vector<i64, 2>;
/// Three `i64` components.
pub type Long3 = Vector<i64, 3>;
/// Four `i64` components.
pub type Long4 = Vector<i64, 4>;
/// Two `bool` components.
pub type Bool2 = Vector<bool, 2>;
/// Three `bool` components.
pub type Bool3 = Vector<bool, 3>;
/// Four `bool` components.
pub type Bool4 = Vector<bool, 4>;
