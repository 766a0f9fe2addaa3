//! Result and error types for Consola.

use thiserror::Error;

/// Result type for Consola operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while driving a console surface
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Query matched nothing before the timeout elapsed
    #[error("No element matching {query} within {timeout_ms}ms")]
    NotFound {
        /// Query in object notation
        query: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Query matched more than one element
    #[error("Query {query} is ambiguous: {count} elements match")]
    Ambiguous {
        /// Query in object notation
        query: String,
        /// Number of matching elements
        count: usize,
    },

    /// Handle used after its element was destroyed or its session ended
    #[error("Stale element handle: {handle}")]
    StaleHandle {
        /// Handle description
        handle: String,
    },

    /// The driver rejected an input event
    #[error("Dispatch of {action} failed: {message}")]
    DispatchFailed {
        /// Action name (click, type, key)
        action: String,
        /// Error message
        message: String,
    },

    /// Bounded wait exceeded without the predicate becoming true
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// Description of the awaited condition
        waited_for: String,
    },

    /// External prerequisite is absent
    #[error("Fixture missing: {path}")]
    FixtureMissing {
        /// Path or name of the missing prerequisite
        path: String,
    },

    /// Query is malformed or underspecified
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Error message
        message: String,
    },

    /// Input text or key name rejected before dispatch
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message
        message: String,
    },

    /// Scenario document or step error
    #[error("Scenario error: {message}")]
    Scenario {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Create an invalid query error
    #[must_use]
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a dispatch failure
    #[must_use]
    pub fn dispatch(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DispatchFailed {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Create a scenario error
    #[must_use]
    pub fn scenario(message: impl Into<String>) -> Self {
        Self::Scenario {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Lookup and wait failures that become failing outcomes instead of errors
    #[must_use]
    pub const fn is_soft(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Timeout { .. })
    }

    /// Failures where the action itself did not happen
    #[must_use]
    pub const fn is_action_error(&self) -> bool {
        matches!(
            self,
            Self::Ambiguous { .. } | Self::StaleHandle { .. } | Self::DispatchFailed { .. }
        )
    }

    /// Failures that stop the whole run
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FixtureMissing { .. }
                | Self::Config { .. }
                | Self::Io(_)
                | Self::Yaml(_)
                | Self::Json(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_errors() {
        let not_found = HarnessError::NotFound {
            query: "{text='66'}".to_string(),
            timeout_ms: 3000,
        };
        let timeout = HarnessError::Timeout {
            ms: 10,
            waited_for: "rows".to_string(),
        };
        assert!(not_found.is_soft());
        assert!(timeout.is_soft());
        assert!(!not_found.is_action_error());
    }

    #[test]
    fn test_action_errors() {
        let ambiguous = HarnessError::Ambiguous {
            query: "{type='Row'}".to_string(),
            count: 2,
        };
        assert!(ambiguous.is_action_error());
        assert!(HarnessError::dispatch("click", "rejected").is_action_error());
        assert!(!HarnessError::invalid_input("empty").is_action_error());
    }

    #[test]
    fn test_fatal_errors() {
        let missing = HarnessError::FixtureMissing {
            path: "app.qmlproject".to_string(),
        };
        assert!(missing.is_fatal());
        assert!(HarnessError::config("bad").is_fatal());
        assert!(!HarnessError::scenario("unknown variable").is_fatal());
        assert!(!HarnessError::dispatch("type", "no focus").is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = HarnessError::Ambiguous {
            query: "{type='Row'}".to_string(),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "Query {type='Row'} is ambiguous: 3 elements match"
        );
        let err = HarnessError::FixtureMissing {
            path: "testdata/app.qmlproject".to_string(),
        };
        assert!(err.to_string().contains("testdata/app.qmlproject"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: HarnessError = io.into();
        assert!(matches!(err, HarnessError::Io(_)));
    }
}
