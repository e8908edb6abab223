//! Tracing bootstrap for the CLI and the long-running watcher.

use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}'")]
    Filter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("a tracing subscriber is already installed")]
    AlreadyInstalled(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Install the global subscriber with compact single-line output. A `RUST_LOG`
/// value overrides the configured level so a running watch session can be
/// re-filtered without editing `.env`.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(config)?)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(TelemetryError::AlreadyInstalled)
}

fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    let directives = match std::env::var("RUST_LOG") {
        Ok(overriding) => overriding,
        Err(_) => config.log_level.clone(),
    };
    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter {
        value: directives,
        source,
    })
}
