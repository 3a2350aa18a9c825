//! guestbridge CLI - inspect and exercise WebAssembly guests from the shell.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use guestbridge_runtime::observability::{init_tracing, LogSettings};

/// guestbridge - typed host bindings for WebAssembly guests.
#[derive(Parser)]
#[command(name = "guestbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Bridge configuration YAML file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every export of a module and whether it can be bound
    Inspect {
        /// Path to the .wasm or .wat file
        module: String,

        /// Print the export table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Call one exported function with primitive arguments
    Call {
        /// Path to the .wasm or .wat file
        module: String,

        /// Export name
        export: String,

        /// Arguments, parsed against the export's parameter kinds
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Tick a worker export a number of times
    Run {
        /// Path to the .wasm or .wat file
        module: String,

        /// Worker export (defaults to `worker.export` from the config)
        #[arg(short, long)]
        worker: Option<String>,

        /// Number of ticks
        #[arg(short, long, default_value = "1")]
        ticks: u32,
    },

    /// Load a module and report link, instantiation and ABI status
    Validate {
        /// Path to the .wasm or .wat file
        module: String,
    },
}

fn setup_logging(settings: &LogSettings, verbosity: u8) -> Result<()> {
    // An explicit filter in the environment beats -v.
    let explicit = std::env::var_os("GUESTBRIDGE_LOG").is_some() || std::env::var_os("RUST_LOG").is_some();
    let settings = if explicit {
        settings.clone()
    } else {
        settings.clone().with_verbosity(verbosity)
    };
    init_tracing(&settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;
    setup_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Inspect { module, json } => commands::inspect::run(&module, json, config).await,
        Commands::Call {
            module,
            export,
            args,
        } => commands::call::run(&module, &export, &args, config).await,
        Commands::Run {
            module,
            worker,
            ticks,
        } => commands::run::run(&module, worker.as_deref(), ticks, config).await,
        Commands::Validate { module } => commands::validate::run(&module, config).await,
    }
}
