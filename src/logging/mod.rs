//! `tracing` subscriber setup for the binary.

use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogFormat;

pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Filter used when `RUST_LOG` is not set.
fn default_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("caching_proxy=info"),
        1 => EnvFilter::new("caching_proxy=debug"),
        _ => EnvFilter::new("caching_proxy=trace,reqwest=debug"),
    }
}

/// Installs the global subscriber, writing to stderr so stdout carries only
/// the user-facing status lines. `RUST_LOG` overrides the verbosity level.
pub fn init(format: LogFormat, verbose: u8) -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    match format {
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .try_init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init(),
    }
}
