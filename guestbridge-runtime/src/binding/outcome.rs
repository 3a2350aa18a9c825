//! Results of guest calls.

use crate::host::GuestAbort;
use guestbridge_core::error::BridgeError;
use wasmtime::Trap;

/// What happened when a binding was invoked.
///
/// Expected conditions are values here, not errors: a missing export or a
/// trap is something call sites branch on.
#[derive(Debug, Clone)]
pub enum CallOutcome<R> {
    /// The guest returned normally.
    Returned(R),
    /// Nothing was called: no instance, export missing or mismatched, or
    /// the instance is poisoned.
    Unavailable(BridgeError),
    /// The guest trapped, including fuel exhaustion.
    Trapped(BridgeError),
    /// The guest called `abort`; the instance is now poisoned.
    Aborted {
        /// Code passed to abort.
        code: i32,
    },
    /// Arguments or results could not be marshalled.
    Rejected(BridgeError),
}

impl<R> CallOutcome<R> {
    /// Whether the guest returned normally.
    pub fn is_returned(&self) -> bool {
        matches!(self, Self::Returned(_))
    }

    /// Returned value, if any.
    pub fn value(self) -> Option<R> {
        match self {
            Self::Returned(value) => Some(value),
            _ => None,
        }
    }

    /// The error behind a failed call.
    pub fn error(&self) -> Option<&BridgeError> {
        match self {
            Self::Unavailable(e) | Self::Trapped(e) | Self::Rejected(e) => Some(e),
            Self::Returned(_) | Self::Aborted { .. } => None,
        }
    }

    /// Map the returned value.
    pub fn map<U>(self, f: impl FnOnce(R) -> U) -> CallOutcome<U> {
        match self {
            Self::Returned(value) => CallOutcome::Returned(f(value)),
            Self::Unavailable(e) => CallOutcome::Unavailable(e),
            Self::Trapped(e) => CallOutcome::Trapped(e),
            Self::Aborted { code } => CallOutcome::Aborted { code },
            Self::Rejected(e) => CallOutcome::Rejected(e),
        }
    }

    /// Convert into a `Result`, turning an abort into `GuestAbort`.
    pub fn into_result(self, export: &str) -> Result<R, BridgeError> {
        match self {
            Self::Returned(value) => Ok(value),
            Self::Unavailable(e) | Self::Trapped(e) | Self::Rejected(e) => Err(e),
            Self::Aborted { code } => Err(BridgeError::GuestAbort {
                export: export.to_string(),
                code,
            }),
        }
    }
}

impl<R: Default> CallOutcome<R> {
    /// Returned value, or the default for anything else.
    pub fn into_value_or_default(self) -> R {
        self.value().unwrap_or_default()
    }
}

/// Classification of an engine error raised by a guest call.
#[derive(Debug)]
pub(crate) enum Fault {
    Abort(i32),
    Trap(BridgeError),
}

pub(crate) fn classify_fault(error: &wasmtime::Error, export: &str, budget: u64) -> Fault {
    if let Some(abort) = error.downcast_ref::<GuestAbort>() {
        return Fault::Abort(abort.code);
    }
    if let Some(Trap::OutOfFuel) = error.downcast_ref::<Trap>() {
        return Fault::Trap(BridgeError::OutOfFuel {
            export: export.to_string(),
            budget,
        });
    }
    Fault::Trap(BridgeError::GuestTrap {
        export: export.to_string(),
        cause: error.root_cause().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_on_failure() {
        let outcome: CallOutcome<i32> = CallOutcome::Unavailable(BridgeError::AbiUnavailable);
        assert!(!outcome.is_returned());
        assert_eq!(outcome.error().map(BridgeError::code), Some("E301"));
        assert_eq!(outcome.into_value_or_default(), 0);

        let outcome = CallOutcome::Returned(5).map(|v| v * 2);
        assert_eq!(outcome.into_value_or_default(), 10);
    }

    #[test]
    fn abort_becomes_error() {
        let outcome: CallOutcome<()> = CallOutcome::Aborted { code: 7 };
        let err = outcome.into_result("tick").unwrap_err();
        assert_eq!(err.code(), "E402");
    }

    #[test]
    fn fault_classification() {
        let abort = wasmtime::Error::new(GuestAbort { code: 3 });
        assert!(matches!(classify_fault(&abort, "f", 10), Fault::Abort(3)));

        let fuel = wasmtime::Error::new(Trap::OutOfFuel);
        match classify_fault(&fuel, "f", 10) {
            Fault::Trap(e) => assert_eq!(e.code(), "E403"),
            other => panic!("unexpected {other:?}"),
        }

        let trap = wasmtime::Error::new(Trap::UnreachableCodeReached);
        match classify_fault(&trap, "f", 10) {
            Fault::Trap(e) => assert_eq!(e.code(), "E401"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
