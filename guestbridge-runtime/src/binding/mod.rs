//! Host-side handles on guest exports.
//!
//! All bindings hold a [`SlotHandle`](crate::lifecycle::SlotHandle), never
//! an instance. They re-resolve by name whenever the slot's instance
//! generation changes, so a reload never leaves a binding pointing at a
//! dead store.

mod function;
mod global;
mod memory;
mod outcome;
mod view;
mod worker;

pub use function::{ActionBinding, BindingPhase, FunctionBinding};
pub use global::{GlobalBinding, GlobalValue};
pub use memory::MemoryBinding;
pub use outcome::CallOutcome;
pub use view::{FrameCopy, MemoryView};
pub use worker::WorkerBinding;
