//! Reporter - scenario reports with Andon Cord support
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │  ScenarioRunner ──► ScenarioReport ──► Reporter                        │
//! │                                                                        │
//! │  ┌────────────────────┐     ┌──────────────────────┐                  │
//! │  │  FailureMode::     │     │  FailureMode::       │                  │
//! │  │  AndonCord         │     │  CollectAll          │                  │
//! │  │                    │     │                      │                  │
//! │  │  stop on first     │     │  record every        │                  │
//! │  │  failed step       │     │  failure (default)   │                  │
//! │  └────────────────────┘     └──────────────────────┘                  │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::outcome::{OutcomeLog, Summary};
use crate::result::{HarnessError, HarnessResult};
use crate::runner::RunState;

/// Failure mode for scenario execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop on the first failed step
    AndonCord,
    /// Record every failure and keep going
    #[default]
    CollectAll,
}

/// Result of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Unique id of this run
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Final runner state
    pub state: RunState,
    /// Recorded outcomes
    pub outcomes: OutcomeLog,
    /// Wall-clock duration
    pub duration: Duration,
    /// Why the run stopped early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl ScenarioReport {
    /// Empty report for a run starting now
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: RunState::Idle,
            outcomes: OutcomeLog::new(),
            duration: Duration::ZERO,
            abort_reason: None,
        }
    }

    /// Counts by status
    #[must_use]
    pub fn summary(&self) -> Summary {
        self.outcomes.summary()
    }

    /// Whether the run was aborted
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self.state, RunState::Aborted)
    }

    /// Completed without failures
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.is_aborted() && self.outcomes.all_passed()
    }

    /// 0 passed, 1 failures, 2 aborted
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.is_aborted() {
            2
        } else if self.outcomes.all_passed() {
            0
        } else {
            1
        }
    }

    /// Pretty JSON
    ///
    /// # Errors
    ///
    /// Serialization failures
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain text report
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Scenario: {} ({})", self.name, self.run_id);
        for record in self.outcomes.records() {
            let _ = writeln!(out, "  {:>3} {}", record.index + 1, record.outcome);
        }
        if let Some(reason) = &self.abort_reason {
            let _ = writeln!(out, "  ABORTED: {reason}");
        }
        let _ = writeln!(
            out,
            "  {} in {:.2}s",
            self.summary(),
            self.duration.as_secs_f64()
        );
        out
    }
}

/// Aggregates scenario reports
#[derive(Debug, Default)]
pub struct Reporter {
    reports: Vec<ScenarioReport>,
    failure_mode: FailureMode,
    suite_name: String,
}

impl Reporter {
    /// Create new reporter (CollectAll mode)
    #[must_use]
    pub fn new() -> Self {
        Self {
            suite_name: "Console Suite".to_string(),
            ..Default::default()
        }
    }

    /// Create reporter with Andon Cord mode
    #[must_use]
    pub fn andon() -> Self {
        Self {
            failure_mode: FailureMode::AndonCord,
            ..Self::new()
        }
    }

    /// Set suite name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.suite_name = name.into();
        self
    }

    /// Failure mode in use
    #[must_use]
    pub const fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Record a scenario report
    ///
    /// # Errors
    ///
    /// In AndonCord mode, returns error if the scenario did not pass
    pub fn record(&mut self, report: ScenarioReport) -> HarnessResult<()> {
        let failed = (!report.passed()).then(|| report.name.clone());
        self.reports.push(report);
        if self.failure_mode == FailureMode::AndonCord {
            if let Some(name) = failed {
                return Err(HarnessError::scenario(format!(
                    "ANDON CORD PULLED: scenario '{name}' failed"
                )));
            }
        }
        Ok(())
    }

    /// Recorded reports
    #[must_use]
    pub fn reports(&self) -> &[ScenarioReport] {
        &self.reports
    }

    /// Outcome counts over all reports
    #[must_use]
    pub fn summary(&self) -> Summary {
        self.reports
            .iter()
            .map(ScenarioReport::summary)
            .fold(Summary::default(), |acc, s| Summary {
                total: acc.total + s.total,
                passed: acc.passed + s.passed,
                failed: acc.failed + s.failed,
                skipped: acc.skipped + s.skipped,
            })
    }

    /// Every scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.reports.iter().all(ScenarioReport::passed)
    }

    /// Worst exit code over all reports
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.reports
            .iter()
            .map(ScenarioReport::exit_code)
            .max()
            .unwrap_or(0)
    }

    /// Plain text report for all scenarios
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!("{}\n", self.suite_name);
        for report in &self.reports {
            out.push_str(&report.render_text());
        }
        let _ = writeln!(out, "Total: {}", self.summary());
        out
    }

    /// All reports as pretty JSON
    ///
    /// # Errors
    ///
    /// Serialization failures
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(&self.reports)?)
    }

    /// Write the JSON report to a file
    ///
    /// # Errors
    ///
    /// Serialization or I/O failures
    pub fn save_json(&self, output_path: &Path) -> HarnessResult<()> {
        std::fs::write(output_path, self.to_json()?)?;
        Ok(())
    }
}
