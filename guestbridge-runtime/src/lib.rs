//! guestbridge runtime
//!
//! Hosts WebAssembly guests on wasmtime and exposes their exports as typed
//! host-side bindings:
//!
//! - **Lifecycle**: [`ModuleSlot`](lifecycle::ModuleSlot) loads a module in
//!   the background, swaps instances atomically and reports failures
//! - **Bindings**: function, action, worker, global and memory handles that
//!   re-resolve by name after every reload
//! - **ABI**: guest allocator negotiation and marshalling of strings,
//!   vectors and colors through linear memory
//! - **Gas**: a fresh fuel budget for every call
//!
//! ```ignore
//! use guestbridge_runtime::prelude::*;
//!
//! let runtime = Arc::new(BridgeRuntime::new(BridgeConfig::default())?);
//! let slot = ModuleSlot::builder("game", runtime, Arc::new(FileSource::new())).build();
//! slot.load("game.wasm").await?;
//!
//! let add = slot.function::<(i32, i32), i32>("add");
//! assert_eq!(add.call((2, 3)).into_value_or_default(), 5);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod abi;
pub mod binding;
pub mod config;
pub mod exports;
pub mod gas;
pub mod host;
pub mod lifecycle;
pub mod marshal;
pub mod memory;
pub mod observability;
pub mod prelude;
pub mod runtime;

pub use abi::Abi;
pub use config::BridgeConfig;
pub use exports::{ExportDescriptor, ExportKind, ExportRegistry};
pub use gas::{BudgetKind, GasMeter};
pub use lifecycle::{LiveInstance, ModuleSlot, SlotPhase};
pub use runtime::BridgeRuntime;
