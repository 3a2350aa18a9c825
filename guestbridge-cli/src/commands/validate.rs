//! Validate command - load a module and report what the host can use.

use anyhow::Result;
use guestbridge_runtime::BridgeConfig;

/// Run the validate command.
pub async fn run(module: &str, config: BridgeConfig) -> Result<()> {
    tracing::info!(module = %module, "Validating module");

    println!("Validation Results for: {}", module);
    println!("========================{}", "=".repeat(module.len()));
    println!();

    let abi_names = config.abi.clone();
    let session = match super::open(module, config).await {
        Ok(session) => session,
        Err(e) => {
            println!("✗ LOAD FAILED:");
            println!("  {:#}", e);
            anyhow::bail!("Module validation failed");
        }
    };

    println!("✓ Module parsed, linked and instantiated");
    println!();

    let instance = &session.instance;
    let mut has_warnings = false;

    match instance.string_format() {
        Some(format) => {
            println!("✓ Allocator ABI negotiated (string format: {})", format);
        }
        None => {
            has_warnings = true;
            println!("⚠ WARNING: No allocator ABI");
            println!(
                "  String, vector and color arguments need {}, {}, {} and {}",
                abi_names.alloc_export,
                abi_names.dealloc_export,
                abi_names.format_global,
                abi_names.memory_export
            );
        }
    }

    let exports = instance.exports();
    let skipped: Vec<_> = exports.iter().filter(|e| !e.compatible).collect();
    println!();
    println!("Module Summary:");
    println!("  Name: {}", instance.name());
    println!("  Exports: {}", exports.len());
    println!("  Bindable: {}", exports.len() - skipped.len());
    println!("  Memory: {} bytes", instance.memory_len());

    for export in &skipped {
        has_warnings = true;
        println!();
        println!(
            "⚠ WARNING: Export '{}' cannot be bound: {}",
            export.name,
            export.reason.as_deref().unwrap_or("unsupported")
        );
    }

    session.print_guest_logs();

    println!();
    println!("========================{}", "=".repeat(module.len()));
    if has_warnings {
        println!("⚠ Validation passed with warnings");
    } else {
        println!("✓ Validation PASSED");
    }

    Ok(())
}
