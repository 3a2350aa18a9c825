//! Per-call fuel budgets.
//!
//! Fuel never carries over between calls: `charge` overwrites whatever the
//! previous call left unspent with the new budget.

use crate::config::GasSettings;
use guestbridge_core::error::{BridgeError, Result};
use wasmtime::{AsContext, AsContextMut};

/// Which named budget a call draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BudgetKind {
    /// Ordinary function or action call.
    Call,
    /// Continuously ticked worker.
    Worker,
}

/// The two named budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasBudget {
    /// Fuel per ordinary call.
    pub call: u64,
    /// Fuel per worker tick.
    pub worker: u64,
}

impl GasBudget {
    /// Fuel granted for `kind`.
    pub fn amount(&self, kind: BudgetKind) -> u64 {
        match kind {
            BudgetKind::Call => self.call,
            BudgetKind::Worker => self.worker,
        }
    }
}

impl From<&GasSettings> for GasBudget {
    fn from(settings: &GasSettings) -> Self {
        Self {
            call: settings.call_budget,
            worker: settings.worker_budget,
        }
    }
}

/// Applies fuel budgets to a store.
#[derive(Debug, Clone, Copy)]
pub struct GasMeter {
    budget: GasBudget,
}

impl GasMeter {
    /// Create a meter with the given budgets.
    pub fn new(budget: GasBudget) -> Self {
        Self { budget }
    }

    /// Configured budgets.
    pub fn budget(&self) -> GasBudget {
        self.budget
    }

    /// Replace whatever fuel is left with exactly `amount`.
    pub fn charge(mut store: impl AsContextMut, amount: u64) -> Result<()> {
        let mut ctx = store.as_context_mut();
        let drained = ctx.get_fuel().map_err(fuel_error)?;
        ctx.set_fuel(amount).map_err(fuel_error)?;
        tracing::trace!(drained, granted = amount, "Fuel charged");
        Ok(())
    }

    /// Charge the named budget.
    pub fn charge_for(&self, store: impl AsContextMut, kind: BudgetKind) -> Result<u64> {
        let amount = self.budget.amount(kind);
        Self::charge(store, amount)?;
        Ok(amount)
    }

    /// Fuel left in the store, 0 when metering is off.
    pub fn remaining(store: impl AsContext) -> u64 {
        store.as_context().get_fuel().unwrap_or(0)
    }
}

fn fuel_error(e: wasmtime::Error) -> BridgeError {
    BridgeError::Engine {
        cause: format!("fuel metering unavailable: {e}"),
    }
}
