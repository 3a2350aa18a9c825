//! Host functions exposed to guests under the `env` namespace.
//!
//! ```text
//! abort(code: i32)              // fatal trap, poisons the instance
//! curtime() -> i64              // monotonic ticks (ns) since instance start
//! fuel_left() -> i64            // fuel remaining in the current budget
//! log(ptr: i32, len: i32)       // UTF-8 message into the log collector
//! ```

use crate::memory::checked_range;
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::logging::{LogCollector, LogLine};
use guestbridge_core::providers::ClockProvider;
use guestbridge_core::types::GuestPtr;
use std::sync::Arc;
use wasmtime::{Caller, Engine, Extern, Linker, StoreLimits};

/// Import namespace for host functions.
pub const ENV_MODULE: &str = "env";

/// Error returned from `env.abort`, recovered by downcasting the trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("guest called abort({code})")]
pub struct GuestAbort {
    /// Code passed by the guest.
    pub code: i32,
}

/// State owned by each store.
pub struct HostState {
    /// Module name, for diagnostics.
    module: String,
    /// Clock backing `curtime`.
    clock: Arc<dyn ClockProvider>,
    /// Clock reading when the instance was created.
    started_at: u64,
    /// Memory and table growth limits.
    pub(crate) limits: StoreLimits,
    /// Destination for guest log messages.
    collector: Option<Arc<LogCollector>>,
    /// Memory export read by `log`.
    memory_export: String,
}

impl HostState {
    /// Create host state; the `curtime` baseline is taken now.
    pub fn new(
        module: impl Into<String>,
        clock: Arc<dyn ClockProvider>,
        limits: StoreLimits,
        collector: Option<Arc<LogCollector>>,
        memory_export: impl Into<String>,
    ) -> Self {
        let started_at = clock.now();
        Self {
            module: module.into(),
            clock,
            started_at,
            limits,
            collector,
            memory_export: memory_export.into(),
        }
    }

    /// Module name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Ticks since the instance was created.
    pub fn elapsed_ticks(&self) -> i64 {
        let elapsed = self.clock.now().saturating_sub(self.started_at);
        i64::try_from(elapsed).unwrap_or(i64::MAX)
    }

    /// Collector receiving guest messages, if any.
    pub fn collector(&self) -> Option<&Arc<LogCollector>> {
        self.collector.as_ref()
    }
}

/// Register all host functions with a linker.
pub fn register_host_functions(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap(
            ENV_MODULE,
            "abort",
            |caller: Caller<'_, HostState>, code: i32| -> wasmtime::Result<()> {
                tracing::warn!(module = %caller.data().module, code, "Guest called abort");
                Err(wasmtime::Error::new(GuestAbort { code }))
            },
        )
        .map_err(|e| host_function_error("abort", e))?;

    linker
        .func_wrap(ENV_MODULE, "curtime", |caller: Caller<'_, HostState>| -> i64 {
            caller.data().elapsed_ticks()
        })
        .map_err(|e| host_function_error("curtime", e))?;

    linker
        .func_wrap(ENV_MODULE, "fuel_left", |caller: Caller<'_, HostState>| -> i64 {
            let fuel = caller.get_fuel().unwrap_or(0);
            i64::try_from(fuel).unwrap_or(i64::MAX)
        })
        .map_err(|e| host_function_error("fuel_left", e))?;

    linker
        .func_wrap(
            ENV_MODULE,
            "log",
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| {
                let name = caller.data().memory_export.clone();
                let memory = match caller.get_export(&name) {
                    Some(Extern::Memory(m)) => m,
                    _ => return,
                };
                let Ok(len) = usize::try_from(len) else {
                    return;
                };

                let data = memory.data(&caller);
                let Some(range) = checked_range(GuestPtr::new(ptr), len, data.len()) else {
                    tracing::warn!(
                        module = %caller.data().module,
                        ptr,
                        len,
                        "Guest log message out of bounds"
                    );
                    return;
                };
                let message = String::from_utf8_lossy(&data[range]).into_owned();

                let state = caller.data();
                tracing::info!(module = %state.module, "[guest] {}", message);
                if let Some(collector) = &state.collector {
                    collector.collect(LogLine::guest(message));
                }
            },
        )
        .map_err(|e| host_function_error("log", e))?;

    Ok(())
}

/// Create a linker with all host functions registered.
pub fn create_linker(engine: &Engine) -> Result<Linker<HostState>> {
    let mut linker = Linker::new(engine);
    register_host_functions(&mut linker)?;
    Ok(linker)
}

fn host_function_error(function: &str, e: wasmtime::Error) -> BridgeError {
    BridgeError::HostFunction {
        function: function.to_string(),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guestbridge_core::providers::MockClock;
    use std::time::Duration;
    use wasmtime::StoreLimitsBuilder;

    #[test]
    fn elapsed_ticks_from_baseline() {
        let clock = Arc::new(MockClock::new());
        clock.advance(Duration::from_nanos(500));
        let state = HostState::new(
            "m",
            clock.clone(),
            StoreLimitsBuilder::new().build(),
            None,
            "memory",
        );
        assert_eq!(state.elapsed_ticks(), 0);
        clock.advance(Duration::from_nanos(250));
        assert_eq!(state.elapsed_ticks(), 250);
        assert_eq!(state.module(), "m");
    }

    #[test]
    fn abort_error_downcasts() {
        let err = wasmtime::Error::new(GuestAbort { code: 7 });
        assert_eq!(err.downcast_ref::<GuestAbort>(), Some(&GuestAbort { code: 7 }));
        assert_eq!(err.to_string(), "guest called abort(7)");
    }

    #[test]
    fn linker_registers_env_imports() {
        let engine = Engine::default();
        assert!(create_linker(&engine).is_ok());
    }
}
