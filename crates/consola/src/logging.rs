//! Logging setup
//!
//! Filtering follows `RUST_LOG`; without it this crate logs at INFO and
//! dependencies at WARN.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "consola=info,warn";

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable single lines on stderr
    #[default]
    Compact,
    /// One JSON object per line on stderr
    Json,
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, e.g. by another
/// test in the same process.
pub fn init(format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(filter());
    let result = match format {
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(false),
            )
            .try_init(),
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let _ = init(LogFormat::Compact);
        assert!(!init(LogFormat::Json));
    }

    #[test]
    fn test_format_names() {
        let format: LogFormat = serde_yaml_ng::from_str("json").unwrap_or_default();
        assert_eq!(format, LogFormat::Json);
    }
}
