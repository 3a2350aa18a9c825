//! Guest pointer type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// An offset into guest linear memory.
///
/// Kept distinct from plain integers so a pointer is never passed where a
/// numeric argument was meant. On the wire it is an `i32` slot. The
/// default is the null offset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct GuestPtr(i32);

impl GuestPtr {
    /// Value boxed in place of a pointer when allocation was impossible.
    ///
    /// Valid allocations are always positive, so this never aliases one.
    pub const ALLOC_FAILED: i32 = -1;

    /// Create a pointer from a raw offset.
    #[must_use]
    pub const fn new(offset: i32) -> Self {
        Self(offset)
    }

    /// Get the raw slot value.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    /// Byte offset usable for indexing memory, `None` if negative.
    #[must_use]
    pub fn as_usize(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    /// Whether this could have come from a successful allocation.
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.0 > 0
    }

    /// Offset this pointer by `bytes`, `None` on overflow.
    #[must_use]
    pub fn checked_add(&self, bytes: i32) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }
}

impl Add<i32> for GuestPtr {
    type Output = GuestPtr;

    fn add(self, rhs: i32) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl From<i32> for GuestPtr {
    fn from(offset: i32) -> Self {
        Self(offset)
    }
}

impl From<GuestPtr> for i32 {
    fn from(ptr: GuestPtr) -> Self {
        ptr.0
    }
}

impl From<GuestPtr> for i64 {
    fn from(ptr: GuestPtr) -> Self {
        i64::from(ptr.0)
    }
}

impl fmt::Display for GuestPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
