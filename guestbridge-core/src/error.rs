//! Error types for guestbridge.
//!
//! Every error carries a stable code (`E101`, `E302`, ...) and maps onto one
//! of five classes that decide how a caller reacts: degrade, default the
//! result, disable the binding, keep the old instance, or fail loudly.

use crate::types::GuestPtr;
use std::path::PathBuf;
use thiserror::Error;

/// How an error should be handled at the binding boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A capability is missing (no ABI, export absent, unsupported shape).
    /// The feature is unavailable; execution continues degraded.
    CapabilityAbsent,
    /// A trap during an ordinary call. The call yields a default value.
    TransientFault,
    /// An explicit abort, or a trap inside a worker. Disables the affected
    /// binding or instance, never the host.
    FatalFault,
    /// The module could not be fetched, parsed, linked or instantiated.
    LoadFailure,
    /// An unrecognised value shape reached the marshalling layer.
    ContractViolation,
}

/// The main error type for guestbridge operations.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    // =========================================================================
    // Load / link errors (E101-E199)
    // =========================================================================
    /// The binary source could not produce module bytes.
    #[error("E101: Failed to fetch module '{reference}': {cause}")]
    ModuleFetch {
        /// Opaque module reference handed to the source.
        reference: String,
        /// Reason for the failure.
        cause: String,
    },

    /// The bytes are not a valid WASM module.
    #[error("E102: Failed to parse module '{module}': {cause}")]
    ModuleParse {
        /// Module name.
        module: String,
        /// Parser or validator message.
        cause: String,
    },

    /// Imports could not be resolved against the host linker.
    #[error("E103: Failed to link module '{module}': {cause}")]
    ModuleLink {
        /// Module name.
        module: String,
        /// Linker message.
        cause: String,
    },

    /// Instantiation failed (start function trap, data segment overflow, ...).
    #[error("E104: Failed to instantiate module '{module}': {cause}")]
    ModuleInstantiate {
        /// Module name.
        module: String,
        /// Engine message.
        cause: String,
    },

    /// A newer load request replaced this one before it completed.
    #[error("E105: Load generation {generation} was superseded by {latest}")]
    LoadSuperseded {
        /// Generation of the discarded load.
        generation: u64,
        /// Latest requested generation.
        latest: u64,
    },

    // =========================================================================
    // Export errors (E201-E299)
    // =========================================================================
    /// No export with this name on the current instance.
    #[error("E201: Export '{name}' not found")]
    ExportNotFound {
        /// Export name.
        name: String,
    },

    /// The export exists but its signature differs from the binding's.
    #[error("E202: Export '{name}' has signature {actual}, expected {expected}")]
    ExportSignature {
        /// Export name.
        name: String,
        /// Signature declared by the binding.
        expected: String,
        /// Signature found on the instance.
        actual: String,
    },

    /// The export has a shape bindings cannot represent.
    #[error("E203: Export '{name}' is not supported: {cause}")]
    UnsupportedExport {
        /// Export name.
        name: String,
        /// Why it was skipped.
        cause: String,
    },

    /// No instance is currently live in the module slot.
    #[error("E204: No live instance for module '{module}'")]
    NoInstance {
        /// Module name.
        module: String,
    },

    // =========================================================================
    // ABI / memory errors (E301-E399)
    // =========================================================================
    /// The guest does not export a usable allocator ABI.
    #[error("E301: Guest ABI unavailable")]
    AbiUnavailable,

    /// The guest allocator returned a non-positive offset or trapped.
    #[error("E302: Guest allocation of {requested} bytes failed")]
    AllocFailed {
        /// Number of bytes requested.
        requested: u64,
    },

    /// A read or write fell outside the current memory length.
    #[error("E303: Memory access at {offset} of {len} bytes exceeds memory length {memory_len}")]
    MemoryAccess {
        /// Start offset.
        offset: GuestPtr,
        /// Access width in bytes.
        len: u64,
        /// Memory length observed at the time of access.
        memory_len: u64,
    },

    /// The negotiated string format cannot encode strings.
    #[error("E304: Unsupported string format {value}")]
    StringFormat {
        /// Raw format value.
        value: i32,
    },

    // =========================================================================
    // Guest faults (E401-E499)
    // =========================================================================
    /// The guest trapped during a call.
    #[error("E401: Guest trapped in '{export}': {cause}")]
    GuestTrap {
        /// Export being invoked.
        export: String,
        /// Trap description.
        cause: String,
    },

    /// The guest called `env.abort`.
    #[error("E402: Guest aborted in '{export}' with code {code}")]
    GuestAbort {
        /// Export being invoked.
        export: String,
        /// Code passed to abort.
        code: i32,
    },

    /// The call exhausted its fuel budget.
    #[error("E403: Guest '{export}' ran out of fuel (budget {budget})")]
    OutOfFuel {
        /// Export being invoked.
        export: String,
        /// Budget granted for the call.
        budget: u64,
    },

    /// The instance aborted earlier and accepts no further calls.
    #[error("E404: Instance generation {generation} is poisoned by an earlier abort")]
    InstancePoisoned {
        /// Generation of the poisoned instance.
        generation: u64,
    },

    // =========================================================================
    // Configuration / IO errors (E501-E599)
    // =========================================================================
    /// Invalid configuration value.
    #[error("E501: Invalid configuration '{field}': {cause}")]
    Config {
        /// Offending field.
        field: String,
        /// Why it was rejected.
        cause: String,
    },

    /// File system error.
    #[error("E502: I/O error at {path}: {cause}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error text.
        cause: String,
    },

    /// The WASM engine could not be created.
    #[error("E503: Engine setup failed: {cause}")]
    Engine {
        /// Engine message.
        cause: String,
    },

    // =========================================================================
    // Host function errors (E601-E699)
    // =========================================================================
    /// Registering a host import failed.
    #[error("E601: Host function '{function}' failed: {cause}")]
    HostFunction {
        /// Import name.
        function: String,
        /// Reason.
        cause: String,
    },

    // =========================================================================
    // Contract violations (E901-E999)
    // =========================================================================
    /// A value shape the marshalling layer does not know about.
    #[error("E901: Marshalling contract violated: {cause}")]
    Contract {
        /// Description of the unexpected shape.
        cause: String,
    },
}

impl BridgeError {
    /// Get the error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModuleFetch { .. } => "E101",
            Self::ModuleParse { .. } => "E102",
            Self::ModuleLink { .. } => "E103",
            Self::ModuleInstantiate { .. } => "E104",
            Self::LoadSuperseded { .. } => "E105",
            Self::ExportNotFound { .. } => "E201",
            Self::ExportSignature { .. } => "E202",
            Self::UnsupportedExport { .. } => "E203",
            Self::NoInstance { .. } => "E204",
            Self::AbiUnavailable => "E301",
            Self::AllocFailed { .. } => "E302",
            Self::MemoryAccess { .. } => "E303",
            Self::StringFormat { .. } => "E304",
            Self::GuestTrap { .. } => "E401",
            Self::GuestAbort { .. } => "E402",
            Self::OutOfFuel { .. } => "E403",
            Self::InstancePoisoned { .. } => "E404",
            Self::Config { .. } => "E501",
            Self::Io { .. } => "E502",
            Self::Engine { .. } => "E503",
            Self::HostFunction { .. } => "E601",
            Self::Contract { .. } => "E901",
        }
    }

    /// Classify this error for the binding boundary.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ExportNotFound { .. }
            | Self::ExportSignature { .. }
            | Self::UnsupportedExport { .. }
            | Self::NoInstance { .. }
            | Self::AbiUnavailable
            | Self::AllocFailed { .. }
            | Self::MemoryAccess { .. }
            | Self::InstancePoisoned { .. } => ErrorClass::CapabilityAbsent,
            Self::GuestTrap { .. } | Self::OutOfFuel { .. } => ErrorClass::TransientFault,
            Self::GuestAbort { .. } => ErrorClass::FatalFault,
            Self::ModuleFetch { .. }
            | Self::ModuleParse { .. }
            | Self::ModuleLink { .. }
            | Self::ModuleInstantiate { .. }
            | Self::LoadSuperseded { .. }
            | Self::Config { .. }
            | Self::Io { .. }
            | Self::Engine { .. }
            | Self::HostFunction { .. } => ErrorClass::LoadFailure,
            Self::StringFormat { .. } | Self::Contract { .. } => ErrorClass::ContractViolation,
        }
    }

    /// Whether this error must disable a binding or instance.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::FatalFault | ErrorClass::ContractViolation
        )
    }

    /// Shorthand for a contract violation.
    pub fn contract(cause: impl Into<String>) -> Self {
        Self::Contract {
            cause: cause.into(),
        }
    }
}

/// Result type alias using `BridgeError`.
pub type Result<T> = std::result::Result<T, BridgeError>;
