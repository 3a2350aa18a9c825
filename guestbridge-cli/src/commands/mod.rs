//! CLI command implementations.

pub mod call;
pub mod inspect;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use guestbridge_core::logging::{LogCollector, LogSource};
use guestbridge_runtime::lifecycle::{FileSource, LiveInstance, ModuleSlot, TracingSink};
use guestbridge_runtime::{BridgeConfig, BridgeRuntime};
use std::path::Path;
use std::sync::Arc;

/// Read the configuration file, if any, then apply environment overrides.
pub fn load_config(path: Option<&str>) -> Result<BridgeConfig> {
    let config = match path {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path))?,
        None => BridgeConfig::default(),
    };
    config
        .with_env_overrides()
        .context("Invalid GUESTBRIDGE_* override")
}

/// A slot with one module loaded from disk.
pub struct Session {
    pub slot: ModuleSlot,
    pub instance: Arc<LiveInstance>,
    pub collector: Arc<LogCollector>,
}

impl Session {
    /// Print guest log lines collected so far.
    pub fn print_guest_logs(&self) {
        for line in self.collector.all() {
            if line.source == LogSource::Guest {
                println!("  [guest {}] {}", line.level, line.message);
            }
        }
    }
}

/// Load `module` into a fresh slot.
pub async fn open(module: &str, config: BridgeConfig) -> Result<Session> {
    if !Path::new(module).exists() {
        anyhow::bail!("Module file not found: {}", module);
    }

    let runtime = Arc::new(BridgeRuntime::new(config).context("Failed to create runtime")?);
    let collector = Arc::new(LogCollector::default());
    let slot = ModuleSlot::builder(module_name(module), runtime, Arc::new(FileSource::new()))
        .collector(Arc::clone(&collector))
        .error_sink(Arc::new(TracingSink))
        .build();

    let instance = slot
        .load(module)
        .await
        .with_context(|| format!("Failed to load module: {}", module))?;

    Ok(Session {
        slot,
        instance,
        collector,
    })
}

fn module_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module")
        .to_string()
}
