//! A live instance and the store that owns it.

use crate::abi::Abi;
use crate::exports::{ExportDescriptor, ExportRegistry};
use crate::gas::GasMeter;
use crate::host::HostState;
use crate::memory::GuestMemory;
use crate::runtime::CompiledModule;
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::types::{GuestPtr, StringFormat};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wasmtime::{Instance, Store};

/// Store-side state of an instance. Only reachable through
/// [`LiveInstance::lock`], so one host thread runs guest code at a time.
pub struct InstanceState {
    pub(crate) store: Store<HostState>,
    pub(crate) instance: Instance,
    pub(crate) memory: Option<GuestMemory>,
    pub(crate) abi: Option<Abi>,
    pub(crate) call_budget: u64,
}

impl InstanceState {
    /// Negotiated ABI, if any.
    pub fn abi(&self) -> Option<&Abi> {
        self.abi.as_ref()
    }

    /// Default memory export, if any.
    pub fn memory(&self) -> Option<GuestMemory> {
        self.memory
    }

    /// Fuel left from the last budget.
    pub fn fuel_remaining(&self) -> u64 {
        GasMeter::remaining(&self.store)
    }

    /// The store, for direct memory or ABI work.
    pub fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    /// Run `f` with the negotiated ABI and the store.
    ///
    /// The store is charged a fresh call budget first, since `f` runs the
    /// guest allocator.
    pub fn with_abi<U>(&mut self, f: impl FnOnce(&Abi, &mut Store<HostState>) -> U) -> Result<U> {
        let abi = self.abi.as_ref().ok_or(BridgeError::AbiUnavailable)?;
        GasMeter::charge(&mut self.store, self.call_budget)?;
        Ok(f(abi, &mut self.store))
    }
}

/// One instantiation of a compiled module.
///
/// Instances are never mutated into a new module: a reload builds a new
/// `LiveInstance` and swaps it into the slot whole.
pub struct LiveInstance {
    generation: u64,
    module: Arc<CompiledModule>,
    string_format: Option<StringFormat>,
    poisoned: AtomicBool,
    inner: Mutex<InstanceState>,
}

impl LiveInstance {
    pub(crate) fn new(
        generation: u64,
        module: Arc<CompiledModule>,
        store: Store<HostState>,
        instance: Instance,
        memory: Option<GuestMemory>,
        abi: Option<Abi>,
        call_budget: u64,
    ) -> Self {
        Self {
            generation,
            module,
            string_format: abi.as_ref().map(Abi::format),
            poisoned: AtomicBool::new(false),
            inner: Mutex::new(InstanceState {
                store,
                instance,
                memory,
                abi,
                call_budget,
            }),
        }
    }

    /// Load generation that produced this instance.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Compiled module backing the instance.
    pub fn module(&self) -> &Arc<CompiledModule> {
        &self.module
    }

    /// Module name.
    pub fn name(&self) -> &str {
        self.module.name()
    }

    /// Whether ABI negotiation succeeded.
    pub fn has_abi(&self) -> bool {
        self.string_format.is_some()
    }

    /// Negotiated string format.
    pub fn string_format(&self) -> Option<StringFormat> {
        self.string_format
    }

    /// Whether an abort has disabled this instance.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    pub(crate) fn poison(&self) {
        if !self.poisoned.swap(true, Ordering::AcqRel) {
            tracing::error!(
                module = self.name(),
                generation = self.generation,
                "Instance poisoned by guest abort"
            );
        }
    }

    /// Lock the store for a guest call or memory access.
    pub fn lock(&self) -> MutexGuard<'_, InstanceState> {
        self.inner.lock()
    }

    /// Decode a length-prefixed string returned by the guest.
    pub fn read_string(&self, ptr: GuestPtr) -> Result<String> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let abi = state.abi.as_ref().ok_or(BridgeError::AbiUnavailable)?;
        abi.read_string(&mut state.store, ptr)
    }

    /// Copy bytes out of the default memory.
    pub fn read_bytes(&self, ptr: GuestPtr, len: usize) -> Result<Vec<u8>> {
        let guard = self.lock();
        let memory = guard.memory.ok_or_else(|| BridgeError::ExportNotFound {
            name: "memory".to_string(),
        })?;
        memory.read_bytes(&guard.store, ptr, len)
    }

    /// Current length of the default memory, 0 without one.
    pub fn memory_len(&self) -> usize {
        let guard = self.lock();
        guard.memory.map_or(0, |m| m.len(&guard.store))
    }

    /// Describe every export of the module.
    pub fn exports(&self) -> Vec<ExportDescriptor> {
        ExportRegistry::enumerate(self.module.module())
    }

    /// Fuel left from the last budget.
    pub fn fuel_remaining(&self) -> u64 {
        self.lock().fuel_remaining()
    }
}

impl std::fmt::Debug for LiveInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveInstance")
            .field("module", &self.name())
            .field("generation", &self.generation)
            .field("string_format", &self.string_format)
            .field("poisoned", &self.is_poisoned())
            .finish_non_exhaustive()
    }
}
