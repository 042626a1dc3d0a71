//! Tracing setup for the matching engine.

use std::fmt;

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

#[derive(Debug)]
pub enum TelemetryError {
    Filter {
        directive: String,
        source: ParseError,
    },
    AlreadyInitialized(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Filter { directive, .. } => {
                write!(f, "invalid log directive '{directive}'")
            }
            TelemetryError::AlreadyInitialized(err) => {
                write!(f, "tracing subscriber rejected: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Filter { source, .. } => Some(source),
            TelemetryError::AlreadyInitialized(err) => Some(&**err),
        }
    }
}

/// Installs the global subscriber: compact single-line output, no ANSI, level
/// taken from `RUST_LOG` when set and from the config otherwise.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(&config.log_level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::AlreadyInitialized)
}

fn env_filter(directive: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(directive).map_err(|source| TelemetryError::Filter {
        directive: directive.to_string(),
        source,
    })
}
