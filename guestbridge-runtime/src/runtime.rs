//! WASM runtime management using Wasmtime.
//!
//! One `BridgeRuntime` owns the engine, the host-function linker and a
//! cache of compiled modules. It is built once from a `BridgeConfig` and
//! shared by `Arc` with every module slot.

use crate::abi::Abi;
use crate::config::BridgeConfig;
use crate::gas::{GasBudget, GasMeter};
use crate::host::{create_linker, HostState};
use crate::lifecycle::LiveInstance;
use crate::memory::GuestMemory;
use dashmap::DashMap;
use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::logging::LogCollector;
use guestbridge_core::providers::ClockProvider;
use std::sync::Arc;
use wasmtime::{Config, Engine, Linker, Module, Store, StoreLimitsBuilder};

/// A compiled WASM module ready for instantiation.
pub struct CompiledModule {
    /// Name used in diagnostics.
    name: String,
    /// The compiled Wasmtime module.
    module: Module,
    /// Hash of the original WASM bytes (for caching).
    hash: u64,
}

impl CompiledModule {
    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the underlying Wasmtime module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Get the hash of this module.
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("name", &self.name)
            .field("hash", &format_args!("{:016x}", self.hash))
            .finish()
    }
}

/// Host services handed to each new instance.
#[derive(Clone)]
pub struct InstanceServices {
    /// Clock backing `curtime`.
    pub clock: Arc<dyn ClockProvider>,
    /// Collector for guest log messages.
    pub collector: Option<Arc<LogCollector>>,
}

/// WASM runtime managing the engine, linker and compiled modules.
pub struct BridgeRuntime {
    /// The Wasmtime engine (thread-safe, can be shared).
    engine: Engine,
    /// Linker with the `env` host functions.
    linker: Linker<HostState>,
    /// Configuration for this runtime.
    config: BridgeConfig,
    /// Cache of compiled modules by their content hash.
    module_cache: DashMap<u64, Arc<CompiledModule>>,
}

impl BridgeRuntime {
    /// Create a new runtime with the given configuration.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let engine = Engine::new(&to_wasmtime_config(&config)).map_err(|e| BridgeError::Engine {
            cause: format!("{e:#}"),
        })?;
        let linker = create_linker(&engine)?;

        tracing::debug!(
            max_memory = config.engine.max_memory_bytes,
            call_budget = config.gas.call_budget,
            worker_budget = config.gas.worker_budget,
            "Bridge runtime created"
        );

        Ok(Self {
            engine,
            linker,
            config,
            module_cache: DashMap::new(),
        })
    }

    /// Create a new runtime with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(BridgeConfig::default())
    }

    /// Get the Wasmtime engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Get the runtime configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Gas meter configured with this runtime's budgets.
    pub fn gas_meter(&self) -> GasMeter {
        GasMeter::new(GasBudget::from(&self.config.gas))
    }

    /// Compile WASM bytes into a module.
    ///
    /// Accepts binary modules and, for tooling, WAT text. If caching is
    /// enabled and identical bytes were compiled before, returns the cached
    /// module.
    pub fn compile(&self, name: &str, wasm_bytes: &[u8]) -> Result<Arc<CompiledModule>> {
        let hash = hash_bytes(wasm_bytes);

        if self.config.engine.cache_modules {
            if let Some(cached) = self.module_cache.get(&hash) {
                tracing::debug!(module = name, hash, "Compiled module cache hit");
                return Ok(Arc::clone(&cached));
            }
        }

        let module = Module::new(&self.engine, wasm_bytes).map_err(|e| BridgeError::ModuleParse {
            module: name.to_string(),
            cause: format!("{e:#}"),
        })?;

        let compiled = Arc::new(CompiledModule {
            name: name.to_string(),
            module,
            hash,
        });

        if self.config.engine.cache_modules {
            self.module_cache.insert(hash, Arc::clone(&compiled));
        }

        Ok(compiled)
    }

    /// Compile WASM bytes from a file.
    pub fn compile_file(&self, path: &std::path::Path) -> Result<Arc<CompiledModule>> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        let wasm_bytes = std::fs::read(path).map_err(|e| BridgeError::Io {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;

        self.compile(name, &wasm_bytes)
    }

    /// Link and instantiate a compiled module in a fresh store.
    ///
    /// The start function, if any, runs with the per-call budget. ABI
    /// negotiation failing is not an error; the instance simply has no ABI.
    pub fn instantiate(
        &self,
        compiled: Arc<CompiledModule>,
        generation: u64,
        services: InstanceServices,
    ) -> Result<LiveInstance> {
        let engine_settings = &self.config.engine;
        let limits = StoreLimitsBuilder::new()
            .memory_size(engine_settings.max_memory_bytes as usize)
            .table_elements(engine_settings.max_table_elements as _)
            .trap_on_grow_failure(true)
            .build();

        let state = HostState::new(
            compiled.name(),
            services.clock,
            limits,
            services.collector,
            self.config.abi.memory_export.clone(),
        );
        let mut store = Store::new(&self.engine, state);
        store.limiter(|state| &mut state.limits);
        GasMeter::charge(&mut store, self.config.gas.call_budget)?;

        let pre = self
            .linker
            .instantiate_pre(compiled.module())
            .map_err(|e| BridgeError::ModuleLink {
                module: compiled.name().to_string(),
                cause: format!("{e:#}"),
            })?;
        let instance = pre
            .instantiate(&mut store)
            .map_err(|e| BridgeError::ModuleInstantiate {
                module: compiled.name().to_string(),
                cause: format!("{e:#}"),
            })?;

        let memory = GuestMemory::from_instance(&mut store, &instance, &self.config.abi.memory_export);
        let abi = memory.and_then(|memory| Abi::negotiate(&mut store, &instance, memory, &self.config.abi));

        let abi_format = abi.as_ref().map(Abi::format);
        tracing::info!(
            module = compiled.name(),
            generation,
            abi = ?abi_format,
            "Module instantiated"
        );

        Ok(LiveInstance::new(
            generation,
            compiled,
            store,
            instance,
            memory,
            abi,
            self.config.gas.call_budget,
        ))
    }

    /// Clear the module cache.
    pub fn clear_cache(&self) {
        self.module_cache.clear();
    }

    /// Get the number of cached modules.
    pub fn cache_size(&self) -> usize {
        self.module_cache.len()
    }
}

/// Create a Wasmtime Config from the bridge configuration.
fn to_wasmtime_config(config: &BridgeConfig) -> Config {
    let engine = &config.engine;
    let mut wasmtime_config = Config::new();

    wasmtime_config.consume_fuel(true);
    wasmtime_config.max_wasm_stack(engine.max_wasm_stack);
    wasmtime_config.wasm_simd(engine.simd);
    if !engine.simd {
        wasmtime_config.wasm_relaxed_simd(false);
    }
    wasmtime_config.wasm_threads(engine.threads);
    wasmtime_config.debug_info(engine.debug_info);
    wasmtime_config.strategy(wasmtime::Strategy::Cranelift);

    wasmtime_config
}

/// Compute a hash of bytes (for cache key).
fn hash_bytes(bytes: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_creation() {
        let runtime = BridgeRuntime::with_defaults().expect("Failed to create runtime");
        assert_eq!(runtime.cache_size(), 0);
        assert_eq!(runtime.gas_meter().budget().call, 100_000);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = BridgeConfig::default().with_call_budget(0);
        let err = BridgeRuntime::new(config).err().unwrap();
        assert_eq!(err.code(), "E501");
    }

    #[test]
    fn compile_caches_by_content() {
        let runtime = BridgeRuntime::with_defaults().unwrap();
        let wasm = wat::parse_str("(module)").unwrap();

        let a = runtime.compile("a", &wasm).unwrap();
        let b = runtime.compile("b", &wasm).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(runtime.cache_size(), 1);

        runtime.clear_cache();
        assert_eq!(runtime.cache_size(), 0);
    }

    #[test]
    fn cache_can_be_disabled() {
        let runtime = BridgeRuntime::new(BridgeConfig::testing()).unwrap();
        let wasm = wat::parse_str("(module)").unwrap();
        let a = runtime.compile("a", &wasm).unwrap();
        let b = runtime.compile("a", &wasm).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(runtime.cache_size(), 0);
    }

    #[test]
    fn garbage_fails_to_parse() {
        let runtime = BridgeRuntime::with_defaults().unwrap();
        let err = runtime.compile("junk", b"not wasm").unwrap_err();
        assert_eq!(err.code(), "E102");
    }

    #[test]
    fn hash_bytes_consistency() {
        let data = b"test data for hashing";
        assert_eq!(hash_bytes(data), hash_bytes(data));
        assert_ne!(hash_bytes(data), hash_bytes(b"different data"));
    }
}
