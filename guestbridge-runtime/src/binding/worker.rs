//! The continuously ticked worker.

use super::function::FunctionBinding;
use super::outcome::CallOutcome;
use crate::gas::BudgetKind;
use crate::lifecycle::ModuleSlot;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A `() -> ()` export called once per host tick with the worker budget.
///
/// A trap or abort disables the worker. It stays disabled, across reloads
/// too, until [`enable`](Self::enable) is called.
#[derive(Debug)]
pub struct WorkerBinding {
    binding: FunctionBinding<(), ()>,
    enabled: AtomicBool,
    ticks: AtomicU64,
}

impl WorkerBinding {
    /// Bind `export` as a worker.
    pub fn new(slot: &ModuleSlot, export: impl Into<String>) -> Self {
        Self {
            binding: FunctionBinding::new(slot, export, BudgetKind::Worker),
            enabled: AtomicBool::new(true),
            ticks: AtomicU64::new(0),
        }
    }

    /// Export name.
    pub fn export(&self) -> &str {
        self.binding.export()
    }

    /// Whether the export is present with a `() -> ()` signature.
    pub fn is_found(&self) -> bool {
        self.binding.is_found()
    }

    /// Whether ticks run.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Resume ticking after a fault.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Stop ticking.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Number of ticks that returned normally.
    pub fn completed_ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Run one tick. `None` when the worker is disabled.
    pub fn tick(&self) -> Option<CallOutcome<()>> {
        if !self.is_enabled() {
            return None;
        }

        let outcome = self.binding.call(());
        match &outcome {
            CallOutcome::Returned(()) => {
                self.ticks.fetch_add(1, Ordering::Relaxed);
            }
            CallOutcome::Unavailable(_) => {}
            CallOutcome::Trapped(e) | CallOutcome::Rejected(e) => {
                self.disable();
                tracing::warn!(export = self.export(), error = %e, "Worker faulted, disabling");
            }
            CallOutcome::Aborted { code } => {
                self.disable();
                tracing::warn!(export = self.export(), code, "Worker aborted, disabling");
            }
        }
        Some(outcome)
    }
}
