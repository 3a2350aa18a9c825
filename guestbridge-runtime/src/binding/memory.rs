//! Memory bindings.

use crate::config::WASM_PAGE_SIZE;
use crate::host::HostState;
use crate::lifecycle::{ModuleSlot, SlotHandle};
use crate::memory::{GuestMemory, MemoryScalar};
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::types::GuestPtr;
use parking_lot::Mutex;
use wasmtime::Store;

/// A handle on one memory export.
///
/// Lengths are read from the live instance on every call; nothing here is
/// cached except the export lookup for the current generation.
#[derive(Debug)]
pub struct MemoryBinding {
    slot: SlotHandle,
    export: String,
    cache: Mutex<Option<(u64, GuestMemory)>>,
}

impl MemoryBinding {
    /// Bind the memory named `export`.
    pub fn new(slot: &ModuleSlot, export: impl Into<String>) -> Self {
        Self {
            slot: slot.handle(),
            export: export.into(),
            cache: Mutex::new(None),
        }
    }

    /// Export name.
    pub fn export(&self) -> &str {
        &self.export
    }

    pub(crate) fn with_memory<U>(&self, f: impl FnOnce(&mut Store<HostState>, GuestMemory) -> U) -> Result<U> {
        let live = self.slot.current().ok_or_else(|| BridgeError::NoInstance {
            module: self.slot.name().to_string(),
        })?;
        let mut guard = live.lock();
        let state = &mut *guard;

        let mut cache = self.cache.lock();
        let memory = match *cache {
            Some((generation, memory)) if generation == live.generation() => memory,
            _ => {
                let memory = GuestMemory::from_instance(&mut state.store, &state.instance, &self.export)
                    .ok_or_else(|| BridgeError::ExportNotFound {
                        name: self.export.clone(),
                    })?;
                *cache = Some((live.generation(), memory));
                memory
            }
        };
        drop(cache);
        Ok(f(&mut state.store, memory))
    }

    /// Whether the memory export exists.
    pub fn is_found(&self) -> bool {
        self.with_memory(|_, _| ()).is_ok()
    }

    /// Current length in bytes, 0 when unavailable.
    pub fn len(&self) -> usize {
        self.with_memory(|store, memory| memory.len(&*store)).unwrap_or(0)
    }

    /// Whether the memory is empty or unavailable.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared minimum size in bytes.
    pub fn minimum_bytes(&self) -> u64 {
        self.with_memory(|store, memory| memory.raw().ty(&*store).minimum().saturating_mul(WASM_PAGE_SIZE))
            .unwrap_or(0)
    }

    /// Declared maximum size in bytes, 0 when unbounded.
    pub fn maximum_bytes(&self) -> u64 {
        self.with_memory(|store, memory| {
            memory
                .raw()
                .ty(&*store)
                .maximum()
                .map_or(0, |pages| pages.saturating_mul(WASM_PAGE_SIZE))
        })
        .unwrap_or(0)
    }

    /// Read a scalar; the default when out of range or unavailable.
    pub fn read<T: MemoryScalar>(&self, offset: GuestPtr) -> T {
        self.with_memory(|store, memory| memory.read::<T>(&*store, offset))
            .unwrap_or_default()
    }

    /// Write a scalar; returns whether it was written.
    pub fn write<T: MemoryScalar>(&self, offset: GuestPtr, value: T) -> bool {
        self.with_memory(|store, memory| memory.write(store, offset, value))
            .unwrap_or(false)
    }

    /// Copy `len` bytes out, all or nothing.
    pub fn read_bytes(&self, offset: GuestPtr, len: usize) -> Result<Vec<u8>> {
        self.with_memory(|store, memory| memory.read_bytes(&*store, offset, len))?
    }

    /// Copy `bytes` in, all or nothing.
    pub fn write_bytes(&self, offset: GuestPtr, bytes: &[u8]) -> Result<()> {
        self.with_memory(|store, memory| memory.write_bytes(store, offset, bytes))?
    }
}
