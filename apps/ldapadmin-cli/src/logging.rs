//! Logging setup using tracing.
//!
//! Logs go to stderr so command output on stdout stays machine readable.
//! `RUST_LOG` takes precedence over `--log-level`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CliError, CliResult};

/// Build the filter from `RUST_LOG`, falling back to `level`.
pub fn build_filter(level: &str) -> CliResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CliError::Config(format!("invalid log filter {level:?}: {e}")))
}

/// Initialize the tracing subscriber, human readable or JSON.
pub fn init_logging(level: &str, json: bool) -> CliResult<()> {
    let filter_layer = build_filter(level)?;

    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .flatten_event(true)
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(filter_layer)
        .try_init()
        .map_err(|e| CliError::Config(format!("logging already initialized: {e}")))?;

    tracing::debug!(level, json, "Logging initialized");
    Ok(())
}

/// Initialize logging for tests (with simpler output).
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
