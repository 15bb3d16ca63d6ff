use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Always appended to the configured level: JSON extraction rejections are
/// logged by axum under this target and explain most 4xx answers.
const REJECTION_DIRECTIVE: &str = "axum::rejection=trace";

#[derive(Debug)]
pub enum TelemetryError {
    Filter { directives: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Filter { directives, .. } => {
                write!(f, "log filter '{}' does not parse", directives)
            }
            TelemetryError::Subscriber(err) => write!(f, "subscriber already installed: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Filter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

fn directives(config: &TelemetryConfig) -> String {
    let level = config.log_level.trim();
    if level.is_empty() {
        format!("info,{REJECTION_DIRECTIVE}")
    } else {
        format!("{level},{REJECTION_DIRECTIVE}")
    }
}

/// `RUST_LOG` wins over the configured level so operators can raise
/// verbosity for one module (e.g. `loan_engine::dropdowns=debug`).
fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = directives(config);
    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter { directives, source })
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = build_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> TelemetryConfig {
        TelemetryConfig {
            log_level: level.to_string(),
        }
    }

    #[test]
    fn configured_level_keeps_rejection_logging() {
        assert_eq!(
            directives(&config("warn,loan_engine=debug")),
            "warn,loan_engine=debug,axum::rejection=trace"
        );
        assert_eq!(directives(&config("  ")), "info,axum::rejection=trace");
    }

    #[test]
    fn configured_directives_parse() {
        assert!(EnvFilter::try_new(directives(&config("debug"))).is_ok());
    }
}
