//! Inspect command - list the exports of a module.

use anyhow::{Context, Result};
use guestbridge_runtime::{BridgeConfig, BridgeRuntime, ExportRegistry};
use std::path::Path;

/// Run the inspect command.
///
/// Only compiles the module, so it works for guests whose imports the host
/// cannot satisfy.
pub async fn run(module: &str, json: bool, config: BridgeConfig) -> Result<()> {
    let path = Path::new(module);
    if !path.exists() {
        anyhow::bail!("Module file not found: {}", module);
    }

    tracing::info!(module = %module, "Inspecting module");

    let runtime = BridgeRuntime::new(config).context("Failed to create runtime")?;
    let compiled = runtime
        .compile_file(path)
        .with_context(|| format!("Failed to compile module: {}", module))?;
    let exports = ExportRegistry::enumerate(compiled.module());

    if json {
        println!("{}", serde_json::to_string_pretty(&exports)?);
        return Ok(());
    }

    println!("Exports of {} ({} total)", compiled.name(), exports.len());
    println!("{}", "=".repeat(60));

    let width = exports.iter().map(|e| e.name.len()).max().unwrap_or(4).max(4);
    println!("  {:<width$}  {:<8}  {:<5}  TYPE", "NAME", "KIND", "BIND");
    for export in &exports {
        let bind = if export.compatible { "yes" } else { "no" };
        println!(
            "  {:<width$}  {:<8}  {:<5}  {}",
            export.name,
            export.kind.to_string(),
            bind,
            export.signature.as_deref().unwrap_or("-"),
        );
        if let Some(reason) = &export.reason {
            println!("  {:<width$}  ↳ {}", "", reason);
        }
    }

    let skipped = exports.iter().filter(|e| !e.compatible).count();
    println!();
    if skipped > 0 {
        println!("⚠ {} export(s) cannot be bound", skipped);
    } else {
        println!("✓ All exports can be bound");
    }

    Ok(())
}
