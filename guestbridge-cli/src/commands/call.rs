//! Call command - invoke one export with primitive arguments.

use anyhow::{Context, Result};
use guestbridge_core::value::WasmValue;
use guestbridge_runtime::binding::CallOutcome;
use guestbridge_runtime::BridgeConfig;

/// Run the call command.
pub async fn run(module: &str, export: &str, args: &[String], config: BridgeConfig) -> Result<()> {
    let session = super::open(module, config).await?;
    let bound = session
        .slot
        .bind_all()
        .context("Module has no live instance")?;

    let Some(function) = bound.function(export) else {
        if let Some(skipped) = bound.skipped.iter().find(|e| e.name == export) {
            anyhow::bail!(
                "Export '{}' cannot be called: {}",
                export,
                skipped.reason.as_deref().unwrap_or("unsupported")
            );
        }
        anyhow::bail!("No function export named '{}'", export);
    };

    let params = &function.signature().params;
    if params.len() != args.len() {
        anyhow::bail!(
            "'{}' has signature {} and takes {} argument(s), got {}",
            export,
            function.signature(),
            params.len(),
            args.len()
        );
    }

    let values = params
        .iter()
        .zip(args)
        .map(|(kind, text)| {
            WasmValue::parse(*kind, text)
                .with_context(|| format!("'{}' is not a valid {}", text, kind))
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(export = %export, args = ?values, "Calling export");

    let outcome = function.invoke(&values);
    session.print_guest_logs();

    match outcome {
        CallOutcome::Returned(Some(value)) => {
            println!("{}", value);
            Ok(())
        }
        CallOutcome::Returned(None) => {
            println!("✓ {} returned", export);
            Ok(())
        }
        CallOutcome::Aborted { code } => anyhow::bail!("Guest aborted with code {}", code),
        CallOutcome::Unavailable(e) | CallOutcome::Trapped(e) | CallOutcome::Rejected(e) => {
            Err(e.into())
        }
    }
}
