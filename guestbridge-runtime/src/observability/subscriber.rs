//! Global subscriber installation.

use super::settings::{LogFormat, LogSettings};
use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn output_layer(settings: &LogSettings) -> BoxedLayer {
    let location = settings.location;
    let thread_ids = settings.thread_ids;
    match settings.format() {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
            .with_file(location)
            .with_line_number(location)
            .with_thread_ids(thread_ids)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_file(location)
            .with_line_number(location)
            .with_thread_ids(thread_ids)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_file(location)
            .with_line_number(location)
            .with_thread_ids(thread_ids)
            .boxed(),
    }
}

/// Install the global subscriber described by `settings`.
///
/// Fails on a malformed filter or when a subscriber is already installed.
pub fn init_tracing(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::try_new(&settings.filter)
        .with_context(|| format!("Invalid log filter '{}'", settings.filter))?;

    tracing_subscriber::registry()
        .with(output_layer(settings))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")
}
