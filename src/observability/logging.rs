//! # Logging
//!
//! Tracing subscriber setup. `RUST_LOG` wins when set; otherwise the filter is
//! built from the configured level.

use crate::config::LoggingConfig;
use crate::constants::DEFAULT_LOG_FILTER;
use tracing_subscriber::EnvFilter;

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Json
        }
    }
}

/// Filter directive for a bare level such as `DEBUG`
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        return DEFAULT_LOG_FILTER.to_string();
    }
    format!("roster_sync={}", level.to_ascii_lowercase())
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, embedding).
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.level)));

    let result = match LogFormat::parse(&config.format) {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init(),
    };
    result.is_ok()
}
