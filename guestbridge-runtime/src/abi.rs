//! Guest allocator ABI.
//!
//! A guest opts into rich argument marshalling by exporting:
//!
//! ```text
//! __resonite_v1_alloc(len: i32) -> i32   // returns a positive offset
//! __resonite_v1_dealloc(ptr: i32)
//! __resonite_v1_str_format: i32          // 1 = UTF-16, 2 = UTF-32, 3 = UTF-8
//! ```
//!
//! Strings are written as a 4-byte little-endian byte length followed by
//! the encoded payload. Vectors are their components in order; colors are
//! four `f32` components followed by an `i32` profile tag.

use crate::config::AbiSettings;
use crate::host::GuestAbort;
use crate::memory::GuestMemory;
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::types::{GuestPtr, StringFormat, COLOR_RECORD_SIZE, SCRATCH_BYTES};
use guestbridge_core::value::HostValue;
use wasmtime::{AsContextMut, Instance, TypedFunc, Val};

/// Size of the length prefix in front of every string.
pub const STRING_PREFIX_SIZE: usize = 4;

/// A negotiated allocator ABI for one instance.
#[derive(Clone)]
pub struct Abi {
    alloc: TypedFunc<i32, i32>,
    dealloc: TypedFunc<i32, ()>,
    format: StringFormat,
    memory: GuestMemory,
}

impl std::fmt::Debug for Abi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Abi")
            .field("format", &self.format)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

impl Abi {
    /// Discover the ABI on an instance.
    ///
    /// Returns `None` unless the allocator pair has the exact expected
    /// signatures and the format global holds a recognised value. A
    /// partially present ABI is never returned.
    pub fn negotiate(
        mut store: impl AsContextMut,
        instance: &Instance,
        memory: GuestMemory,
        names: &AbiSettings,
    ) -> Option<Self> {
        let alloc = match instance.get_typed_func::<i32, i32>(&mut store, &names.alloc_export) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(export = %names.alloc_export, error = %e, "No guest allocator");
                return None;
            }
        };
        let dealloc = match instance.get_typed_func::<i32, ()>(&mut store, &names.dealloc_export) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(export = %names.dealloc_export, error = %e, "No guest deallocator");
                return None;
            }
        };
        let Some(global) = instance.get_global(&mut store, &names.format_global) else {
            tracing::debug!(export = %names.format_global, "No string format global");
            return None;
        };
        let raw = match global.get(&mut store) {
            Val::I32(raw) => raw,
            other => {
                tracing::debug!(value = ?other, "String format global is not an i32");
                return None;
            }
        };
        let Some(format) = StringFormat::from_raw(raw) else {
            tracing::debug!(value = raw, "Unrecognised string format");
            return None;
        };

        Some(Self {
            alloc,
            dealloc,
            format,
            memory,
        })
    }

    /// Negotiated string format.
    pub fn format(&self) -> StringFormat {
        self.format
    }

    /// Memory the ABI writes into.
    pub fn memory(&self) -> GuestMemory {
        self.memory
    }

    /// Allocate `len` bytes in the guest.
    ///
    /// A non-positive offset from the guest is an allocation failure. An
    /// `abort` from inside the allocator is reported as [`BridgeError::GuestAbort`].
    pub fn alloc_block(&self, store: impl AsContextMut, len: usize) -> Result<GuestPtr> {
        let requested = len as u64;
        let size = i32::try_from(len).map_err(|_| BridgeError::AllocFailed { requested })?;
        let ptr = self.alloc.call(store, size).map_err(|e| {
            if let Some(abort) = aborted(&e, "alloc") {
                return abort;
            }
            tracing::warn!(requested, error = %e.root_cause(), "Guest allocator trapped");
            BridgeError::AllocFailed { requested }
        })?;
        let ptr = GuestPtr::new(ptr);
        if !ptr.is_allocated() {
            return Err(BridgeError::AllocFailed { requested });
        }
        Ok(ptr)
    }

    /// Return a block to the guest allocator.
    pub fn dealloc(&self, store: impl AsContextMut, ptr: GuestPtr) -> Result<()> {
        self.dealloc
            .call(store, ptr.as_i32())
            .map_err(|e| {
                aborted(&e, "dealloc").unwrap_or_else(|| BridgeError::GuestTrap {
                    export: "dealloc".to_string(),
                    cause: e.root_cause().to_string(),
                })
            })
    }

    /// Allocate a block and copy `bytes` into it.
    ///
    /// If the copy fails the block is returned to the guest before the
    /// error is reported.
    pub fn alloc_bytes(&self, mut store: impl AsContextMut, bytes: &[u8]) -> Result<GuestPtr> {
        let ptr = self.alloc_block(&mut store, bytes.len())?;
        if let Err(e) = self.memory.write_bytes(&mut store, ptr, bytes) {
            return Err(self.rollback(&mut store, ptr).unwrap_or(e));
        }
        Ok(ptr)
    }

    /// Encode `s` with the negotiated format and allocate it with a length
    /// prefix.
    pub fn alloc_string(&self, store: impl AsContextMut, s: &str) -> Result<GuestPtr> {
        let payload = self.format.encode(s).ok_or(BridgeError::StringFormat {
            value: self.format.as_raw(),
        })?;
        let prefix = i32::try_from(payload.len()).map_err(|_| BridgeError::AllocFailed {
            requested: payload.len() as u64,
        })?;

        let mut block = Vec::with_capacity(STRING_PREFIX_SIZE + payload.len());
        block.extend_from_slice(&prefix.to_le_bytes());
        block.extend_from_slice(&payload);
        self.alloc_bytes(store, &block)
    }

    /// Read a length-prefixed string written by the guest or by
    /// [`alloc_string`](Self::alloc_string).
    pub fn read_string(&self, mut store: impl AsContextMut, ptr: GuestPtr) -> Result<String> {
        let len: i32 = self.memory.try_read(&mut store, ptr)?;
        let payload_at = ptr
            .checked_add(STRING_PREFIX_SIZE as i32)
            .ok_or_else(|| BridgeError::MemoryAccess {
                offset: ptr,
                len: STRING_PREFIX_SIZE as u64,
                memory_len: self.memory.len(&mut store) as u64,
            })?;
        let len = usize::try_from(len).map_err(|_| BridgeError::MemoryAccess {
            offset: payload_at,
            len: 0,
            memory_len: self.memory.len(&mut store) as u64,
        })?;
        let bytes = self.memory.read_bytes(&mut store, payload_at, len)?;
        self.format.decode(&bytes).ok_or(BridgeError::StringFormat {
            value: self.format.as_raw(),
        })
    }

    /// Allocate a string, vector or color and write it.
    pub fn alloc_value(&self, mut store: impl AsContextMut, value: &HostValue) -> Result<GuestPtr> {
        let size = match value {
            HostValue::String(s) => return self.alloc_string(store, s),
            HostValue::Vector(v) => v.byte_len(),
            HostValue::Color(_) => COLOR_RECORD_SIZE,
            other => {
                return Err(BridgeError::contract(format!(
                    "cannot allocate a {:?} in guest memory",
                    other.host_type()
                )))
            }
        };

        let ptr = self.alloc_block(&mut store, size)?;
        if let Err(e) = self.write_value(&mut store, value, ptr) {
            return Err(self.rollback(&mut store, ptr).unwrap_or(e));
        }
        Ok(ptr)
    }

    /// Serialize a vector or color at `ptr` with one bounds-checked write.
    pub fn write_value(&self, store: impl AsContextMut, value: &HostValue, ptr: GuestPtr) -> Result<()> {
        let mut scratch = [0u8; SCRATCH_BYTES];
        let bytes = match value {
            HostValue::Vector(v) => v.encode(&mut scratch),
            HostValue::Color(c) => c.encode(&mut scratch),
            other => {
                return Err(BridgeError::contract(format!(
                    "cannot write a {:?} as a memory record",
                    other.host_type()
                )))
            }
        };
        self.memory.write_bytes(store, ptr, bytes)
    }

    /// Release a block after a failed write. Returns the dealloc error only
    /// when it must replace the write error.
    fn rollback(&self, store: impl AsContextMut, ptr: GuestPtr) -> Option<BridgeError> {
        match self.dealloc(store, ptr) {
            Ok(()) => None,
            Err(e) if e.is_fatal() => Some(e),
            Err(e) => {
                tracing::warn!(%ptr, error = %e, "Failed to release guest block after write error");
                None
            }
        }
    }
}

fn aborted(error: &wasmtime::Error, export: &str) -> Option<BridgeError> {
    error.downcast_ref::<GuestAbort>().map(|abort| BridgeError::GuestAbort {
        export: export.to_string(),
        code: abort.code,
    })
}
