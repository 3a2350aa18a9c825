//! Export reflection and bulk binding.
//!
//! The export table of a guest is untrusted and arbitrarily shaped. Each
//! export is classified on its own; anything that cannot be bound is
//! reported and skipped, never fatal for the rest.

use crate::binding::{CallOutcome, FunctionBinding, GlobalBinding, MemoryBinding};
use crate::gas::BudgetKind;
use crate::lifecycle::ModuleSlot;
use crate::marshal::{val_kind, Signature};
use guestbridge_core::error::BridgeError;
use guestbridge_core::value::{ValKind, WasmValue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use wasmtime::{ExportType, Module, Mutability};

/// Largest parameter count a function binding supports.
pub const MAX_ARITY: usize = 4;

/// Kind of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// Function.
    Function,
    /// Global.
    Global,
    /// Linear memory.
    Memory,
    /// Table.
    Table,
    /// Anything else the engine reports.
    Other,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Function => "function",
            Self::Global => "global",
            Self::Memory => "memory",
            Self::Table => "table",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// One entry of the discovery result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDescriptor {
    /// Export name.
    pub name: String,
    /// Export kind.
    pub kind: ExportKind,
    /// Whether a binding can be built for it.
    pub compatible: bool,
    /// Type summary, when the type could be read.
    pub signature: Option<String>,
    /// Why the export is incompatible.
    pub reason: Option<String>,
}

enum Shape {
    Function(Signature),
    Global(ValKind),
    Memory,
}

struct Classified {
    descriptor: ExportDescriptor,
    shape: Option<Shape>,
}

impl Classified {
    fn bindable(name: &str, kind: ExportKind, signature: String, shape: Shape) -> Self {
        Self {
            descriptor: ExportDescriptor {
                name: name.to_string(),
                kind,
                compatible: true,
                signature: Some(signature),
                reason: None,
            },
            shape: Some(shape),
        }
    }

    fn skipped(name: &str, kind: ExportKind, signature: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            descriptor: ExportDescriptor {
                name: name.to_string(),
                kind,
                compatible: false,
                signature,
                reason: Some(reason.into()),
            },
            shape: None,
        }
    }
}

/// Typed bindings for every compatible export of an instance.
#[derive(Debug, Default)]
pub struct BoundExports {
    /// Function and action bindings by export name.
    pub functions: BTreeMap<String, BoundFunction>,
    /// Global bindings by export name.
    pub globals: BTreeMap<String, BoundGlobal>,
    /// Memory bindings by export name.
    pub memories: BTreeMap<String, Arc<MemoryBinding>>,
    /// Exports that could not be bound.
    pub skipped: Vec<ExportDescriptor>,
}

impl BoundExports {
    /// Function binding by name.
    pub fn function(&self, name: &str) -> Option<&BoundFunction> {
        self.functions.get(name)
    }

    /// Global binding by name.
    pub fn global(&self, name: &str) -> Option<&BoundGlobal> {
        self.globals.get(name)
    }

    /// Memory binding by name.
    pub fn memory(&self, name: &str) -> Option<&Arc<MemoryBinding>> {
        self.memories.get(name)
    }
}

/// A function binding of one of the supported shapes.
///
/// Actions have no result, functions exactly one.
#[allow(missing_docs)]
#[derive(Debug)]
pub enum BoundFunction {
    Action0(FunctionBinding<[WasmValue; 0], ()>),
    Action1(FunctionBinding<[WasmValue; 1], ()>),
    Action2(FunctionBinding<[WasmValue; 2], ()>),
    Action3(FunctionBinding<[WasmValue; 3], ()>),
    Action4(FunctionBinding<[WasmValue; 4], ()>),
    Function0(FunctionBinding<[WasmValue; 0], WasmValue>),
    Function1(FunctionBinding<[WasmValue; 1], WasmValue>),
    Function2(FunctionBinding<[WasmValue; 2], WasmValue>),
    Function3(FunctionBinding<[WasmValue; 3], WasmValue>),
    Function4(FunctionBinding<[WasmValue; 4], WasmValue>),
}

macro_rules! each_binding {
    ($self:expr, $b:ident => $body:expr) => {
        match $self {
            BoundFunction::Action0($b) => $body,
            BoundFunction::Action1($b) => $body,
            BoundFunction::Action2($b) => $body,
            BoundFunction::Action3($b) => $body,
            BoundFunction::Action4($b) => $body,
            BoundFunction::Function0($b) => $body,
            BoundFunction::Function1($b) => $body,
            BoundFunction::Function2($b) => $body,
            BoundFunction::Function3($b) => $body,
            BoundFunction::Function4($b) => $body,
        }
    };
}

macro_rules! call_action {
    ($binding:expr, $args:expr) => {
        match $args.try_into() {
            Ok(array) => $binding.call(array).map(|()| None),
            Err(_) => CallOutcome::Rejected(arity_error($binding.signature(), $args.len())),
        }
    };
}

macro_rules! call_function {
    ($binding:expr, $args:expr) => {
        match $args.try_into() {
            Ok(array) => $binding.call(array).map(Some),
            Err(_) => CallOutcome::Rejected(arity_error($binding.signature(), $args.len())),
        }
    };
}

fn arity_error(signature: &Signature, given: usize) -> BridgeError {
    BridgeError::contract(format!(
        "{signature} takes {} arguments, got {given}",
        signature.arity()
    ))
}

impl BoundFunction {
    fn new(slot: &ModuleSlot, name: &str, signature: Signature) -> Option<Self> {
        let budget = BudgetKind::Call;
        let has_result = !signature.results.is_empty();
        let bound = match (signature.arity(), has_result) {
            (0, false) => Self::Action0(FunctionBinding::with_signature(slot, name, signature, budget)),
            (1, false) => Self::Action1(FunctionBinding::with_signature(slot, name, signature, budget)),
            (2, false) => Self::Action2(FunctionBinding::with_signature(slot, name, signature, budget)),
            (3, false) => Self::Action3(FunctionBinding::with_signature(slot, name, signature, budget)),
            (4, false) => Self::Action4(FunctionBinding::with_signature(slot, name, signature, budget)),
            (0, true) => Self::Function0(FunctionBinding::with_signature(slot, name, signature, budget)),
            (1, true) => Self::Function1(FunctionBinding::with_signature(slot, name, signature, budget)),
            (2, true) => Self::Function2(FunctionBinding::with_signature(slot, name, signature, budget)),
            (3, true) => Self::Function3(FunctionBinding::with_signature(slot, name, signature, budget)),
            (4, true) => Self::Function4(FunctionBinding::with_signature(slot, name, signature, budget)),
            _ => return None,
        };
        Some(bound)
    }

    /// Export name.
    pub fn export(&self) -> &str {
        each_binding!(self, b => b.export())
    }

    /// Signature of the export.
    pub fn signature(&self) -> &Signature {
        each_binding!(self, b => b.signature())
    }

    /// Whether this is an action (no result).
    pub fn is_action(&self) -> bool {
        matches!(
            self,
            Self::Action0(_) | Self::Action1(_) | Self::Action2(_) | Self::Action3(_) | Self::Action4(_)
        )
    }

    /// Whether the export is present on the current instance.
    pub fn is_found(&self) -> bool {
        each_binding!(self, b => b.is_found())
    }

    /// Call with dynamically typed arguments.
    ///
    /// The result is `None` for actions. A wrong argument count is rejected
    /// without calling the guest.
    pub fn invoke(&self, args: &[WasmValue]) -> CallOutcome<Option<WasmValue>> {
        match self {
            Self::Action0(b) => call_action!(b, args),
            Self::Action1(b) => call_action!(b, args),
            Self::Action2(b) => call_action!(b, args),
            Self::Action3(b) => call_action!(b, args),
            Self::Action4(b) => call_action!(b, args),
            Self::Function0(b) => call_function!(b, args),
            Self::Function1(b) => call_function!(b, args),
            Self::Function2(b) => call_function!(b, args),
            Self::Function3(b) => call_function!(b, args),
            Self::Function4(b) => call_function!(b, args),
        }
    }
}

/// A global binding of one of the four value kinds.
#[allow(missing_docs)]
#[derive(Debug)]
pub enum BoundGlobal {
    I32(GlobalBinding<i32>),
    I64(GlobalBinding<i64>),
    F32(GlobalBinding<f32>),
    F64(GlobalBinding<f64>),
}

impl BoundGlobal {
    fn new(slot: &ModuleSlot, name: &str, kind: ValKind) -> Self {
        match kind {
            ValKind::I32 => Self::I32(GlobalBinding::new(slot, name)),
            ValKind::I64 => Self::I64(GlobalBinding::new(slot, name)),
            ValKind::F32 => Self::F32(GlobalBinding::new(slot, name)),
            ValKind::F64 => Self::F64(GlobalBinding::new(slot, name)),
        }
    }

    /// Value kind of the global.
    pub fn kind(&self) -> ValKind {
        match self {
            Self::I32(_) => ValKind::I32,
            Self::I64(_) => ValKind::I64,
            Self::F32(_) => ValKind::F32,
            Self::F64(_) => ValKind::F64,
        }
    }

    /// Current value, zero when unavailable.
    pub fn get(&self) -> WasmValue {
        match self {
            Self::I32(g) => WasmValue::I32(g.get()),
            Self::I64(g) => WasmValue::I64(g.get()),
            Self::F32(g) => WasmValue::F32(g.get()),
            Self::F64(g) => WasmValue::F64(g.get()),
        }
    }

    /// Write a value of the matching kind. Returns whether it was written.
    pub fn set(&self, value: WasmValue) -> bool {
        match (self, value) {
            (Self::I32(g), WasmValue::I32(v)) => g.set(v),
            (Self::I64(g), WasmValue::I64(v)) => g.set(v),
            (Self::F32(g), WasmValue::F32(v)) => g.set(v),
            (Self::F64(g), WasmValue::F64(v)) => g.set(v),
            _ => false,
        }
    }

    /// Whether the global is mutable.
    pub fn is_mutable(&self) -> bool {
        match self {
            Self::I32(g) => g.is_mutable(),
            Self::I64(g) => g.is_mutable(),
            Self::F32(g) => g.is_mutable(),
            Self::F64(g) => g.is_mutable(),
        }
    }
}

/// Reflection over a module's export table.
pub struct ExportRegistry;

impl ExportRegistry {
    fn classify(export: &ExportType<'_>) -> Classified {
        let name = export.name();
        let ty = export.ty();

        if let Some(func) = ty.func() {
            let Some(signature) = Signature::of_func_type(func) else {
                return Classified::skipped(name, ExportKind::Function, None, "unrecognized value kind");
            };
            let summary = signature.to_string();
            if signature.results.len() > 1 {
                return Classified::skipped(name, ExportKind::Function, Some(summary), "multiple results");
            }
            if signature.arity() > MAX_ARITY {
                let reason = format!("{} parameters, at most {MAX_ARITY} supported", signature.arity());
                return Classified::skipped(name, ExportKind::Function, Some(summary), reason);
            }
            return Classified::bindable(name, ExportKind::Function, summary, Shape::Function(signature));
        }

        if let Some(global) = ty.global() {
            let Some(kind) = val_kind(global.content()) else {
                return Classified::skipped(name, ExportKind::Global, None, "unrecognized value kind");
            };
            let summary = match global.mutability() {
                Mutability::Var => format!("mut {kind}"),
                Mutability::Const => kind.to_string(),
            };
            return Classified::bindable(name, ExportKind::Global, summary, Shape::Global(kind));
        }

        if let Some(memory) = ty.memory() {
            let summary = match memory.maximum() {
                Some(max) => format!("{}..{max} pages", memory.minimum()),
                None => format!("{}.. pages", memory.minimum()),
            };
            return Classified::bindable(name, ExportKind::Memory, summary, Shape::Memory);
        }

        if ty.table().is_some() {
            return Classified::skipped(name, ExportKind::Table, None, "tables are not supported");
        }
        Classified::skipped(name, ExportKind::Other, None, "export kind is not supported")
    }

    fn classify_all(module: &Module) -> Vec<Classified> {
        module
            .exports()
            .map(|export| {
                let classified = Self::classify(&export);
                let d = &classified.descriptor;
                tracing::info!(
                    export = %d.name,
                    kind = %d.kind,
                    signature = d.signature.as_deref().unwrap_or("?"),
                    compatible = d.compatible,
                    "Export discovered"
                );
                if let Some(reason) = &d.reason {
                    tracing::warn!(export = %d.name, kind = %d.kind, reason = %reason, "Skipping export");
                }
                classified
            })
            .collect()
    }

    /// Describe every export of `module`.
    pub fn enumerate(module: &Module) -> Vec<ExportDescriptor> {
        Self::classify_all(module)
            .into_iter()
            .map(|c| c.descriptor)
            .collect()
    }

    /// Bind every compatible export of the slot's live instance.
    ///
    /// `None` when the slot has no instance.
    pub fn bind_all(slot: &ModuleSlot) -> Option<BoundExports> {
        let live = slot.current()?;
        let mut bound = BoundExports::default();

        for classified in Self::classify_all(live.module().module()) {
            let name = classified.descriptor.name.clone();
            match classified.shape {
                Some(Shape::Function(signature)) => match BoundFunction::new(slot, &name, signature) {
                    Some(function) => {
                        bound.functions.insert(name, function);
                    }
                    None => bound.skipped.push(classified.descriptor),
                },
                Some(Shape::Global(kind)) => {
                    bound.globals.insert(name.clone(), BoundGlobal::new(slot, &name, kind));
                }
                Some(Shape::Memory) => {
                    bound.memories.insert(name.clone(), slot.memory(name));
                }
                None => bound.skipped.push(classified.descriptor),
            }
        }

        tracing::debug!(
            module = slot.name(),
            functions = bound.functions.len(),
            globals = bound.globals.len(),
            memories = bound.memories.len(),
            skipped = bound.skipped.len(),
            "Exports bound"
        );
        Some(bound)
    }
}
