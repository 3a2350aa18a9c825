//! Bridge configuration from YAML and the environment.
//!
//! ```yaml
//! engine:
//!   max_memory_bytes: 16777216
//!   simd: true
//! gas:
//!   call_budget: 100000
//!   worker_budget: 10000000
//! abi:
//!   alloc_export: __resonite_v1_alloc
//! logging:
//!   format: compact
//!   filter: info
//! ```

use crate::observability::LogSettings;
use guestbridge_core::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// WASM page size in bytes.
pub const WASM_PAGE_SIZE: u64 = 65_536;

/// Budget granted to each ordinary function or action call.
pub const DEFAULT_CALL_BUDGET: u64 = 100_000;

/// Budget granted to each worker tick.
pub const DEFAULT_WORKER_BUDGET: u64 = 10_000_000;

/// Engine and store limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Cap on linear memory growth, in bytes.
    pub max_memory_bytes: u64,
    /// Cap on table elements.
    pub max_table_elements: u32,
    /// Maximum native stack used by guest code, in bytes.
    pub max_wasm_stack: usize,
    /// Enable the SIMD proposal.
    pub simd: bool,
    /// Enable the threads proposal.
    pub threads: bool,
    /// Emit debug info for compiled code.
    pub debug_info: bool,
    /// Reuse compiled modules with identical bytes.
    pub cache_modules: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_memory_bytes: 1 << 24,
            max_table_elements: 1024,
            max_wasm_stack: 64 * 1024,
            simd: true,
            threads: false,
            debug_info: true,
            cache_modules: true,
        }
    }
}

/// Fuel budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSettings {
    /// Fuel for each function or action call.
    pub call_budget: u64,
    /// Fuel for each worker tick.
    pub worker_budget: u64,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            call_budget: DEFAULT_CALL_BUDGET,
            worker_budget: DEFAULT_WORKER_BUDGET,
        }
    }
}

/// Export names making up the guest allocator ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbiSettings {
    /// `(i32) -> i32` allocator.
    pub alloc_export: String,
    /// `(i32) -> ()` deallocator.
    pub dealloc_export: String,
    /// `i32` global holding the string format.
    pub format_global: String,
    /// Linear memory export.
    pub memory_export: String,
}

impl Default for AbiSettings {
    fn default() -> Self {
        Self {
            alloc_export: "__resonite_v1_alloc".to_string(),
            dealloc_export: "__resonite_v1_dealloc".to_string(),
            format_global: "__resonite_v1_str_format".to_string(),
            memory_export: "memory".to_string(),
        }
    }
}

/// Worker defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Export ticked by the CLI `run` command when none is given.
    pub export: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            export: "worker".to_string(),
        }
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Engine and store limits.
    pub engine: EngineSettings,
    /// Fuel budgets.
    pub gas: GasSettings,
    /// Allocator ABI export names.
    pub abi: AbiSettings,
    /// Worker defaults.
    pub worker: WorkerSettings,
    /// Tracing output.
    pub logging: LogSettings,
}

impl BridgeConfig {
    /// Configuration with smaller limits and no module cache.
    pub fn testing() -> Self {
        Self {
            engine: EngineSettings {
                max_memory_bytes: 1 << 22,
                debug_info: false,
                cache_modules: false,
                ..EngineSettings::default()
            },
            ..Self::default()
        }
    }

    /// Parse from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| BridgeError::Config {
            field: e
                .location()
                .map(|l| format!("line {}", l.line()))
                .unwrap_or_else(|| "<document>".to_string()),
            cause: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| BridgeError::Io {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        Self::from_yaml_str(&text)
    }

    /// Apply `GUESTBRIDGE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// Recognised keys: `GUESTBRIDGE_CALL_BUDGET`, `GUESTBRIDGE_WORKER_BUDGET`,
    /// `GUESTBRIDGE_MAX_MEMORY`, plus the logging keys handled by
    /// [`LogSettings::with_overrides_from`].
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Some(value) = parse_override(&lookup, "GUESTBRIDGE_CALL_BUDGET")? {
            self.gas.call_budget = value;
        }
        if let Some(value) = parse_override(&lookup, "GUESTBRIDGE_WORKER_BUDGET")? {
            self.gas.worker_budget = value;
        }
        if let Some(value) = parse_override(&lookup, "GUESTBRIDGE_MAX_MEMORY")? {
            self.engine.max_memory_bytes = value;
        }
        self.logging = self.logging.with_overrides_from(&lookup)?;
        self.validate()?;
        Ok(self)
    }

    /// Set the per-call budget.
    pub fn with_call_budget(mut self, budget: u64) -> Self {
        self.gas.call_budget = budget;
        self
    }

    /// Set the worker budget.
    pub fn with_worker_budget(mut self, budget: u64) -> Self {
        self.gas.worker_budget = budget;
        self
    }

    /// Set the memory cap in bytes.
    pub fn with_max_memory(mut self, bytes: u64) -> Self {
        self.engine.max_memory_bytes = bytes;
        self
    }

    /// Enable or disable the compiled-module cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.engine.cache_modules = enabled;
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.gas.call_budget == 0 {
            return Err(config_error("gas.call_budget", "must be greater than zero"));
        }
        if self.gas.worker_budget == 0 {
            return Err(config_error(
                "gas.worker_budget",
                "must be greater than zero",
            ));
        }
        if self.engine.max_memory_bytes == 0 {
            return Err(config_error(
                "engine.max_memory_bytes",
                "must be greater than zero",
            ));
        }
        if usize::try_from(self.engine.max_memory_bytes).is_err() {
            return Err(config_error(
                "engine.max_memory_bytes",
                "does not fit in the host address space",
            ));
        }
        if self.engine.max_wasm_stack == 0 {
            return Err(config_error(
                "engine.max_wasm_stack",
                "must be greater than zero",
            ));
        }
        for (field, name) in [
            ("abi.alloc_export", &self.abi.alloc_export),
            ("abi.dealloc_export", &self.abi.dealloc_export),
            ("abi.format_global", &self.abi.format_global),
            ("abi.memory_export", &self.abi.memory_export),
        ] {
            if name.is_empty() {
                return Err(config_error(field, "must not be empty"));
            }
        }
        Ok(())
    }
}

fn config_error(field: &str, cause: &str) -> BridgeError {
    BridgeError::Config {
        field: field.to_string(),
        cause: cause.to_string(),
    }
}

fn parse_override(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| config_error(key, &e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.engine.max_memory_bytes, 16 * 1024 * 1024);
        assert_eq!(config.engine.max_table_elements, 1024);
        assert_eq!(config.gas.call_budget, 100_000);
        assert_eq!(config.gas.worker_budget, 10_000_000);
        assert_eq!(config.abi.alloc_export, "__resonite_v1_alloc");
        assert!(config.engine.simd);
        assert!(!config.engine.threads);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
gas:
  call_budget: 500
abi:
  memory_export: mem
"#;
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.gas.call_budget, 500);
        assert_eq!(config.gas.worker_budget, DEFAULT_WORKER_BUDGET);
        assert_eq!(config.abi.memory_export, "mem");
        assert_eq!(config.abi.dealloc_export, "__resonite_v1_dealloc");
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = BridgeConfig::from_yaml_str("gas:\n  worker_budget: 0\n").unwrap_err();
        assert_eq!(err.code(), "E501");
        assert!(err.to_string().contains("gas.worker_budget"));
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GUESTBRIDGE_CALL_BUDGET", "42"),
            ("GUESTBRIDGE_MAX_MEMORY", "65536"),
        ]
        .into_iter()
        .collect();

        let config = BridgeConfig::default()
            .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.gas.call_budget, 42);
        assert_eq!(config.engine.max_memory_bytes, 65_536);
        assert_eq!(config.gas.worker_budget, DEFAULT_WORKER_BUDGET);
        assert_eq!(config.logging, LogSettings::default());
    }

    #[test]
    fn logging_section() {
        let yaml = "logging:\n  format: json\n  filter: debug\n";
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.logging.format, Some(crate::observability::LogFormat::Json));
        assert_eq!(config.logging.filter, "debug");

        let err = BridgeConfig::default()
            .with_overrides_from(|k| (k == "GUESTBRIDGE_LOG_FORMAT").then(|| "xml".into()))
            .unwrap_err();
        assert!(err.to_string().contains("logging.format"));
    }

    #[test]
    fn malformed_override() {
        let err = BridgeConfig::default()
            .with_overrides_from(|k| (k == "GUESTBRIDGE_WORKER_BUDGET").then(|| "lots".into()))
            .unwrap_err();
        assert!(err.to_string().contains("GUESTBRIDGE_WORKER_BUDGET"));
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");
        std::fs::write(&path, "engine:\n  cache_modules: false\n").unwrap();

        let config = BridgeConfig::from_file(&path).unwrap();
        assert!(!config.engine.cache_modules);

        let missing = BridgeConfig::from_file(dir.path().join("nope.yaml")).unwrap_err();
        assert_eq!(missing.code(), "E502");
    }
}
