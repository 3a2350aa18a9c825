//! Prelude for hosts.
//!
//! ```
//! use guestbridge_runtime::prelude::*;
//! ```

pub use guestbridge_core::prelude::*;

pub use crate::abi::Abi;
pub use crate::binding::{
    ActionBinding, BindingPhase, CallOutcome, FrameCopy, FunctionBinding, GlobalBinding, MemoryBinding,
    MemoryView, WorkerBinding,
};
pub use crate::config::BridgeConfig;
pub use crate::exports::{BoundExports, BoundFunction, BoundGlobal, ExportDescriptor, ExportKind, ExportRegistry};
pub use crate::gas::{BudgetKind, GasBudget, GasMeter};
pub use crate::lifecycle::{
    BinarySource, CollectorSink, ErrorSink, FileSource, LiveInstance, MemorySource, ModuleSlot, SlotPhase,
    SlotStatus, TracingSink,
};
pub use crate::marshal::Signature;
pub use crate::runtime::BridgeRuntime;

pub use std::sync::Arc;
