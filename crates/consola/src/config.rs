//! Harness configuration
//!
//! Every field has a default, so an empty file (or none at all) is a valid
//! configuration.
//!
//! ```yaml
//! timeouts:
//!   assert_ms: 3000
//!   output_ms: 2000
//!   locate_ms: 5000
//!   poll_interval_ms: 50
//! failure_mode: collect_all
//! capture_mode: last_known
//! abort_on_action_error: false
//! log_format: compact
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::console::{ConsoleContext, DEFAULT_OUTPUT_TIMEOUT_MS};
use crate::locator::{LocatorOptions, DEFAULT_TIMEOUT_MS};
use crate::logging::LogFormat;
use crate::reporter::FailureMode;
use crate::result::{HarnessError, HarnessResult};
use crate::runner::CaptureMode;
use crate::wait::DEFAULT_POLL_INTERVAL_MS;

/// Default time for an expected output line to appear (3 seconds)
pub const DEFAULT_ASSERT_TIMEOUT_MS: u64 = 3000;

/// Timeout settings in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Wait for an expected line in the console view
    #[serde(default = "default_assert")]
    pub assert_ms: u64,
    /// Wait for output rows after submitting
    #[serde(default = "default_output")]
    pub output_ms: u64,
    /// Wait for widgets to exist
    #[serde(default = "default_locate")]
    pub locate_ms: u64,
    /// Delay between polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            assert_ms: default_assert(),
            output_ms: default_output(),
            locate_ms: default_locate(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_assert() -> u64 {
    DEFAULT_ASSERT_TIMEOUT_MS
}
fn default_output() -> u64 {
    DEFAULT_OUTPUT_TIMEOUT_MS
}
fn default_locate() -> u64 {
    DEFAULT_TIMEOUT_MS
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl TimeoutConfig {
    /// Assertion timeout
    #[must_use]
    pub const fn assert_timeout(&self) -> Duration {
        Duration::from_millis(self.assert_ms)
    }

    /// Locator options for these timeouts
    #[must_use]
    pub const fn locator_options(&self) -> LocatorOptions {
        LocatorOptions {
            timeout: Duration::from_millis(self.locate_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Stop on first failure or collect all
    #[serde(default)]
    pub failure_mode: FailureMode,

    /// What a capture returns when nothing can be read
    #[serde(default)]
    pub capture_mode: CaptureMode,

    /// Abort the scenario on ambiguous lookups, stale handles and rejected input
    #[serde(default)]
    pub abort_on_action_error: bool,

    /// Console layout
    #[serde(default)]
    pub console: ConsoleContext,

    /// Log line format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl HarnessConfig {
    /// Parse YAML and validate
    ///
    /// # Errors
    ///
    /// `Yaml` for malformed documents, `Config` for invalid values
    pub fn from_yaml_str(yaml: &str) -> HarnessResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    ///
    /// # Errors
    ///
    /// `Io`, `Yaml` or `Config`
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load from a file when it exists, defaults otherwise
    ///
    /// # Errors
    ///
    /// See [`HarnessConfig::load`]
    pub fn load_or_default(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// `Config` describing the first invalid value
    pub fn validate(&self) -> HarnessResult<()> {
        if self.timeouts.poll_interval_ms == 0 {
            return Err(HarnessError::config("timeouts.poll_interval_ms must be positive"));
        }
        if self.console.submit_key.trim().is_empty() {
            return Err(HarnessError::config("console.submit_key must not be empty"));
        }
        if self.console.min_rows < self.console.echo_rows + self.console.trailing_rows {
            return Err(HarnessError::config(
                "console.min_rows must cover echo_rows and trailing_rows",
            ));
        }
        Ok(())
    }

    /// Console context with the configured output timeout
    #[must_use]
    pub fn console_context(&self) -> ConsoleContext {
        self.console
            .clone()
            .with_output_timeout(self.timeouts.output_ms)
    }
}
