//! Module loading and the slot that owns the live instance.

mod instance;
mod slot;
mod source;

pub use instance::{InstanceState, LiveInstance};
pub use slot::{ModuleSlot, ModuleSlotBuilder, SlotHandle, SlotPhase, SlotStatus, TickReport};
pub use source::{BinarySource, CollectorSink, ErrorSink, FetchFuture, FileSource, MemorySource, TracingSink};
