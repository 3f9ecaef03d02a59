//! Tracing setup for the assessment service. `RUST_LOG` wins when it is
//! set; otherwise the configured level is expanded to cover the vinosost
//! crates explicitly so a bare "info" still surfaces assessment events.

use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log directives '{directives}'")]
    Directives {
        directives: String,
        #[source]
        source: ParseError,
    },
    #[error("could not install the tracing subscriber")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A bare level ("info", "debug") becomes crate-scoped directives; any
/// value that already carries directives is passed through untouched.
fn directives_for(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    format!("{level},vinosost={level},vinosost_api={level}")
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = directives_for(&config.log_level);
            EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Directives {
                directives,
                source,
            })?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)
}
