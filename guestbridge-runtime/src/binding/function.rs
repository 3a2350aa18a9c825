//! Function and action bindings.
//!
//! A binding names an export and a signature. It never owns the instance:
//! on every call it looks up the slot's current instance and, when the
//! generation changed, re-resolves the export by name.

use super::outcome::{classify_fault, CallOutcome, Fault};
use crate::gas::{BudgetKind, GasMeter};
use crate::lifecycle::{InstanceState, LiveInstance, ModuleSlot, SlotHandle};
use crate::marshal::{box_argument, from_val, to_val, GuestArgs, GuestReturn, Signature, StaticArgs, StaticReturn};
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::value::WasmValue;
use parking_lot::Mutex;
use std::marker::PhantomData;
use wasmtime::{Func, Val};

/// Where a binding stands relative to the current instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingPhase {
    /// Not yet looked up.
    Unresolved,
    /// Bound to the export of this generation.
    Resolved {
        /// Instance generation.
        generation: u64,
    },
    /// Looked up, but missing or mismatched. Calls return defaults.
    NotCallable {
        /// Instance generation.
        generation: u64,
        /// Why the export cannot be called.
        reason: String,
    },
    /// The slot has no instance, or is gone.
    Invalidated,
}

enum BindingState {
    Unresolved,
    Resolved { generation: u64, func: Func },
    NotCallable { generation: u64, error: BridgeError },
    Invalidated,
}

/// A typed handle on one function export.
///
/// `A` describes the arguments and `R` the result; `R = ()` makes it an
/// action.
pub struct FunctionBinding<A, R> {
    slot: SlotHandle,
    export: String,
    signature: Signature,
    budget: BudgetKind,
    meter: GasMeter,
    state: Mutex<BindingState>,
    _marker: PhantomData<fn(A) -> R>,
}

/// A function binding with no result.
pub type ActionBinding<A> = FunctionBinding<A, ()>;

impl<A: StaticArgs, R: StaticReturn> FunctionBinding<A, R> {
    /// Bind `export` with the signature implied by `A` and `R`.
    pub fn new(slot: &ModuleSlot, export: impl Into<String>, budget: BudgetKind) -> Self {
        let signature = Signature::new(A::param_kinds(), R::result_kinds());
        Self::with_signature(slot, export, signature, budget)
    }
}

impl<A: GuestArgs, R: GuestReturn> FunctionBinding<A, R> {
    /// Bind `export` with an explicit signature.
    pub fn with_signature(
        slot: &ModuleSlot,
        export: impl Into<String>,
        signature: Signature,
        budget: BudgetKind,
    ) -> Self {
        Self {
            slot: slot.handle(),
            export: export.into(),
            signature,
            budget,
            meter: slot.runtime().gas_meter(),
            state: Mutex::new(BindingState::Unresolved),
            _marker: PhantomData,
        }
    }

    /// Export name.
    pub fn export(&self) -> &str {
        &self.export
    }

    /// Declared signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Budget each call is charged with.
    pub fn budget_kind(&self) -> BudgetKind {
        self.budget
    }

    /// Current phase, without resolving.
    pub fn phase(&self) -> BindingPhase {
        match &*self.state.lock() {
            BindingState::Unresolved => BindingPhase::Unresolved,
            BindingState::Resolved { generation, .. } => BindingPhase::Resolved {
                generation: *generation,
            },
            BindingState::NotCallable { generation, error } => BindingPhase::NotCallable {
                generation: *generation,
                reason: error.to_string(),
            },
            BindingState::Invalidated => BindingPhase::Invalidated,
        }
    }

    /// Point the binding at another export. It re-resolves on next use.
    pub fn retarget(&mut self, export: impl Into<String>) {
        self.export = export.into();
        *self.state.get_mut() = BindingState::Unresolved;
    }

    /// Resolve against the current instance.
    pub fn resolve(&self) -> Result<()> {
        let live = self.live()?;
        let mut guard = live.lock();
        self.resolve_in(&live, &mut guard).map(|_| ())
    }

    /// Whether the export is present with the declared signature.
    pub fn is_found(&self) -> bool {
        self.resolve().is_ok()
    }

    /// Invoke the export.
    pub fn call(&self, args: A) -> CallOutcome<R> {
        let live = match self.live() {
            Ok(live) => live,
            Err(e) => return CallOutcome::Unavailable(e),
        };
        if live.is_poisoned() {
            return CallOutcome::Unavailable(BridgeError::InstancePoisoned {
                generation: live.generation(),
            });
        }

        let mut guard = live.lock();
        let state = &mut *guard;
        let func = match self.resolve_in(&live, state) {
            Ok(func) => func,
            Err(e) => return CallOutcome::Unavailable(e),
        };
        let budget = match self.meter.charge_for(&mut state.store, self.budget) {
            Ok(budget) => budget,
            Err(e) => return CallOutcome::Unavailable(e),
        };

        let params = match self.marshal_args(state, &args) {
            Ok(params) => params,
            Err(BridgeError::GuestAbort { code, .. }) => {
                drop(guard);
                live.poison();
                tracing::error!(export = %self.export, code, "Guest aborted while marshalling arguments");
                return CallOutcome::Aborted { code };
            }
            Err(e) => {
                tracing::error!(export = %self.export, error = %e, "Argument marshalling failed");
                return CallOutcome::Rejected(e);
            }
        };

        let mut results = vec![Val::I32(0); self.signature.results.len()];
        if let Err(e) = func.call(&mut state.store, &params, &mut results) {
            return match classify_fault(&e, &self.export, budget) {
                Fault::Abort(code) => {
                    drop(guard);
                    live.poison();
                    tracing::error!(export = %self.export, code, "Guest aborted");
                    CallOutcome::Aborted { code }
                }
                Fault::Trap(error) => {
                    tracing::warn!(export = %self.export, error = %error, "Guest call trapped");
                    CallOutcome::Trapped(error)
                }
            };
        }

        let values = results.iter().map(from_val).collect::<Option<Vec<WasmValue>>>();
        match values.as_deref().and_then(R::from_results) {
            Some(value) => CallOutcome::Returned(value),
            None => CallOutcome::Rejected(BridgeError::contract(format!(
                "results of '{}' do not match {}",
                self.export, self.signature
            ))),
        }
    }

    fn live(&self) -> Result<std::sync::Arc<LiveInstance>> {
        match self.slot.current() {
            Some(live) => Ok(live),
            None => {
                *self.state.lock() = BindingState::Invalidated;
                Err(BridgeError::NoInstance {
                    module: self.slot.name().to_string(),
                })
            }
        }
    }

    fn resolve_in(&self, live: &LiveInstance, instance: &mut InstanceState) -> Result<Func> {
        let generation = live.generation();
        let mut state = self.state.lock();
        match &*state {
            BindingState::Resolved { generation: g, func } if *g == generation => return Ok(*func),
            BindingState::NotCallable { generation: g, error } if *g == generation => {
                return Err(error.clone())
            }
            _ => {}
        }

        let lookup = self.lookup(instance);
        *state = match &lookup {
            Ok(func) => {
                tracing::debug!(export = %self.export, generation, "Export resolved");
                BindingState::Resolved {
                    generation,
                    func: *func,
                }
            }
            Err(error) => {
                tracing::debug!(export = %self.export, generation, error = %error, "Export not callable");
                BindingState::NotCallable {
                    generation,
                    error: error.clone(),
                }
            }
        };
        lookup
    }

    fn lookup(&self, state: &mut InstanceState) -> Result<Func> {
        let func = state
            .instance
            .get_func(&mut state.store, &self.export)
            .ok_or_else(|| BridgeError::ExportNotFound {
                name: self.export.clone(),
            })?;
        let ty = func.ty(&state.store);
        if !self.signature.matches(&ty) {
            return Err(BridgeError::ExportSignature {
                name: self.export.clone(),
                expected: self.signature.to_string(),
                actual: Signature::of_func_type(&ty)
                    .map_or_else(|| "(unsupported)".to_string(), |s| s.to_string()),
            });
        }
        Ok(func)
    }

    fn marshal_args(&self, state: &mut InstanceState, args: &A) -> Result<Vec<Val>> {
        let values = args.host_values();
        if values.len() != self.signature.params.len() {
            return Err(BridgeError::contract(format!(
                "'{}' takes {} arguments, got {}",
                self.export,
                self.signature.params.len(),
                values.len()
            )));
        }

        let mut params = Vec::with_capacity(values.len());
        for (value, kind) in values.iter().zip(&self.signature.params) {
            let boxed = box_argument(&mut state.store, state.abi.as_ref(), value)?;
            let slot = boxed.to_slot(*kind).ok_or_else(|| {
                BridgeError::contract(format!("{boxed:?} does not fit a {kind} slot"))
            })?;
            params.push(to_val(slot));
        }
        Ok(params)
    }
}

impl<A, R> std::fmt::Debug for FunctionBinding<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionBinding")
            .field("module", &self.slot.name())
            .field("export", &self.export)
            .field("signature", &self.signature.to_string())
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}
