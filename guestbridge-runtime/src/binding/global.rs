//! Global bindings.

use crate::lifecycle::{ModuleSlot, SlotHandle};
use crate::host::HostState;
use crate::marshal::{from_val, to_val, val_kind};
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::value::{ValKind, WasmValue};
use parking_lot::Mutex;
use std::marker::PhantomData;
use wasmtime::{Global, Mutability, Store};

/// Host types a global can hold.
pub trait GlobalValue: Copy + Default + Send + Sync + 'static {
    /// Kind of the global.
    const KIND: ValKind;

    /// Extract from a slot value of the right kind.
    fn from_wasm(value: WasmValue) -> Option<Self>;

    /// Wrap as a slot value.
    fn to_wasm(self) -> WasmValue;
}

macro_rules! impl_global_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl GlobalValue for $ty {
            const KIND: ValKind = ValKind::$variant;

            fn from_wasm(value: WasmValue) -> Option<Self> {
                match value {
                    WasmValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn to_wasm(self) -> WasmValue {
                WasmValue::$variant(self)
            }
        })*
    };
}

impl_global_value!(i32 => I32, i64 => I64, f32 => F32, f64 => F64);

/// A typed handle on one global export.
pub struct GlobalBinding<T> {
    slot: SlotHandle,
    export: String,
    cache: Mutex<Option<(u64, Global)>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: GlobalValue> GlobalBinding<T> {
    /// Bind the global named `export`.
    pub fn new(slot: &ModuleSlot, export: impl Into<String>) -> Self {
        Self {
            slot: slot.handle(),
            export: export.into(),
            cache: Mutex::new(None),
            _marker: PhantomData,
        }
    }

    /// Export name.
    pub fn export(&self) -> &str {
        &self.export
    }

    fn with_global<U>(&self, f: impl FnOnce(&mut Store<HostState>, Global) -> U) -> Result<U> {
        let live = self.slot.current().ok_or_else(|| BridgeError::NoInstance {
            module: self.slot.name().to_string(),
        })?;
        let mut guard = live.lock();
        let state = &mut *guard;

        let mut cache = self.cache.lock();
        let global = match *cache {
            Some((generation, global)) if generation == live.generation() => global,
            _ => {
                let global = state
                    .instance
                    .get_global(&mut state.store, &self.export)
                    .ok_or_else(|| BridgeError::ExportNotFound {
                        name: self.export.clone(),
                    })?;
                let ty = global.ty(&state.store);
                if val_kind(ty.content()) != Some(T::KIND) {
                    *cache = None;
                    return Err(BridgeError::ExportSignature {
                        name: self.export.clone(),
                        expected: T::KIND.to_string(),
                        actual: format!("{:?}", ty.content()),
                    });
                }
                *cache = Some((live.generation(), global));
                global
            }
        };
        drop(cache);
        Ok(f(&mut state.store, global))
    }

    /// Whether the global is present with the right kind.
    pub fn is_found(&self) -> bool {
        self.with_global(|_, _| ()).is_ok()
    }

    /// Whether the global can be written.
    pub fn is_mutable(&self) -> bool {
        self.with_global(|store, global| global.ty(&*store).mutability() == Mutability::Var)
            .unwrap_or(false)
    }

    /// Read the global.
    pub fn try_get(&self) -> Result<T> {
        self.with_global(|store, global| from_val(&global.get(&mut *store)).and_then(T::from_wasm))?
            .ok_or_else(|| BridgeError::contract(format!("global '{}' changed kind", self.export)))
    }

    /// Read the global, or the default when it is unavailable.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_default()
    }

    /// Write the global. Ignored, returning `false`, when the global is
    /// immutable or unavailable.
    pub fn set(&self, value: T) -> bool {
        let result = self.with_global(|store, global| {
            if global.ty(&*store).mutability() != Mutability::Var {
                return false;
            }
            global.set(&mut *store, to_val(value.to_wasm())).is_ok()
        });
        match result {
            Ok(written) => {
                if !written {
                    tracing::debug!(export = %self.export, "Ignored write to immutable global");
                }
                written
            }
            Err(_) => false,
        }
    }
}

impl<T> std::fmt::Debug for GlobalBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalBinding")
            .field("export", &self.export)
            .finish_non_exhaustive()
    }
}
