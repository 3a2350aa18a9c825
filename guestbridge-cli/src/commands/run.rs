//! Run command - tick a worker export.

use anyhow::Result;
use guestbridge_runtime::BridgeConfig;

/// Run the run command.
pub async fn run(module: &str, worker: Option<&str>, ticks: u32, config: BridgeConfig) -> Result<()> {
    let session = super::open(module, config).await?;
    let worker = session.slot.register_worker(worker);

    if !worker.is_found() {
        anyhow::bail!("Worker export '{}' not found or not () -> ()", worker.export());
    }

    tracing::info!(worker = %worker.export(), ticks, "Running worker");

    for tick in 1..=ticks {
        let report = session.slot.process_pending();
        if report.faulted > 0 || report.disabled > 0 {
            session.print_guest_logs();
            println!("✗ Worker disabled at tick {}", tick);
            anyhow::bail!("Worker '{}' faulted", worker.export());
        }
    }

    session.print_guest_logs();
    println!(
        "✓ {} completed {} tick(s), {} fuel left on the last tick",
        worker.export(),
        worker.completed_ticks(),
        session.instance.fuel_remaining()
    );
    Ok(())
}
