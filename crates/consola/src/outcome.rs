//! Outcomes: soft assertion results with diagnostic detail.
//!
//! A failed comparison never stops the caller. It becomes a [`Outcome::Failed`]
//! record carrying both the expected value and whatever was actually observed,
//! and the run moves on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendered in place of a missing actual value
pub const NO_OUTPUT: &str = "no output";

/// Result of one comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Expected and actual agree
    Passed {
        /// What was checked
        description: String,
        /// Expected value
        expected: String,
        /// Observed value
        actual: String,
    },
    /// Expected and actual differ, or nothing was observed
    Failed {
        /// What was checked
        description: String,
        /// Expected value
        expected: String,
        /// Last observed value, if any
        actual: Option<String>,
    },
    /// Not executed
    Skipped {
        /// What would have been checked
        description: String,
        /// Why it did not run
        reason: String,
    },
}

impl Outcome {
    /// Passing outcome
    #[must_use]
    pub fn passed(
        description: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Passed {
            description: description.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Failing outcome
    #[must_use]
    pub fn failed(
        description: impl Into<String>,
        expected: impl Into<String>,
        actual: Option<String>,
    ) -> Self {
        Self::Failed {
            description: description.into(),
            expected: expected.into(),
            actual,
        }
    }

    /// Skipped outcome
    #[must_use]
    pub fn skipped(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Skipped {
            description: description.into(),
            reason: reason.into(),
        }
    }

    /// Compare and record either way
    #[must_use]
    pub fn compare(description: impl Into<String>, expected: &str, actual: Option<&str>) -> Self {
        match actual {
            Some(actual) if actual == expected => Self::passed(description, expected, actual),
            _ => Self::failed(description, expected, actual.map(str::to_string)),
        }
    }

    /// Whether this is a pass
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    /// Whether this is a failure
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Whether this was skipped
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Description of the check
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Passed { description, .. }
            | Self::Failed { description, .. }
            | Self::Skipped { description, .. } => description,
        }
    }

    /// One-line diagnostic
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Passed {
                expected, actual, ..
            } => format!("expected '{expected}', got '{actual}'"),
            Self::Failed {
                expected, actual, ..
            } => match actual {
                Some(actual) => format!("expected '{expected}', got '{actual}'"),
                None => format!("expected '{expected}', got {NO_OUTPUT}"),
            },
            Self::Skipped { reason, .. } => reason.clone(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Passed { .. } => "PASS",
            Self::Failed { .. } => "FAIL",
            Self::Skipped { .. } => "SKIP",
        };
        write!(f, "[{tag}] {}: {}", self.description(), self.detail())
    }
}

/// Outcome with its position and time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Position in the log
    pub index: usize,
    /// The outcome
    #[serde(flatten)]
    pub outcome: Outcome,
    /// When it was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// All outcomes
    pub total: usize,
    /// Passed outcomes
    pub passed: usize,
    /// Failed outcomes
    pub failed: usize,
    /// Skipped outcomes
    pub skipped: usize,
}

impl Summary {
    /// Pass rate over executed outcomes (0.0 to 1.0)
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        let executed = self.passed + self.failed;
        if executed == 0 {
            return 1.0;
        }
        self.passed as f64 / executed as f64
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped ({} total)",
            self.passed, self.failed, self.skipped, self.total
        )
    }
}

/// Append-only outcome log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeLog {
    records: Vec<OutcomeRecord>,
}

impl OutcomeLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome, returning its index
    pub fn append(&mut self, outcome: Outcome) -> usize {
        let index = self.records.len();
        match &outcome {
            Outcome::Failed { .. } => tracing::warn!(index, %outcome, "outcome"),
            _ => tracing::info!(index, %outcome, "outcome"),
        }
        self.records.push(OutcomeRecord {
            index,
            outcome,
            recorded_at: Utc::now(),
        });
        index
    }

    /// Recorded outcomes in order
    #[must_use]
    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    /// Outcomes in order
    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.records.iter().map(|r| &r.outcome)
    }

    /// Number of outcomes
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent outcome
    #[must_use]
    pub fn last(&self) -> Option<&Outcome> {
        self.records.last().map(|r| &r.outcome)
    }

    /// Failed outcomes
    #[must_use]
    pub fn failures(&self) -> Vec<&Outcome> {
        self.outcomes().filter(|o| o.is_failed()).collect()
    }

    /// No failures recorded
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.outcomes().any(Outcome::is_failed)
    }

    /// Counts by status
    #[must_use]
    pub fn summary(&self) -> Summary {
        self.outcomes().fold(
            Summary {
                total: self.len(),
                ..Summary::default()
            },
            |mut s, o| {
                match o {
                    Outcome::Passed { .. } => s.passed += 1,
                    Outcome::Failed { .. } => s.failed += 1,
                    Outcome::Skipped { .. } => s.skipped += 1,
                }
                s
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_compare() {
            assert!(Outcome::compare("w", "66", Some("66")).is_passed());
            assert!(Outcome::compare("w", "66", Some("65")).is_failed());
            assert!(Outcome::compare("w", "66", None).is_failed());
        }

        #[test]
        fn test_missing_actual_renders_no_output() {
            let outcome = Outcome::failed("width", "66", None);
            assert_eq!(outcome.detail(), "expected '66', got no output");
            assert_eq!(outcome.to_string(), "[FAIL] width: expected '66', got no output");
        }

        #[test]
        fn test_json_is_tagged() {
            let json = serde_json::to_value(Outcome::skipped("x", "xfail")).unwrap();
            assert_eq!(json["status"], "skipped");
            assert_eq!(json["reason"], "xfail");
        }
    }

    mod log_tests {
        use super::*;

        #[test]
        fn test_append_preserves_order() {
            let mut log = OutcomeLog::new();
            assert_eq!(log.append(Outcome::passed("a", "1", "1")), 0);
            assert_eq!(log.append(Outcome::failed("b", "2", Some("3".into()))), 1);
            assert_eq!(log.append(Outcome::skipped("c", "halted")), 2);
            let names: Vec<_> = log.outcomes().map(Outcome::description).collect();
            assert_eq!(names, vec!["a", "b", "c"]);
            assert!(log.records().iter().enumerate().all(|(i, r)| r.index == i));
        }

        #[test]
        fn test_summary() {
            let mut log = OutcomeLog::new();
            let _ = log.append(Outcome::passed("a", "1", "1"));
            let _ = log.append(Outcome::failed("b", "2", None));
            let _ = log.append(Outcome::skipped("c", "halted"));
            let summary = log.summary();
            assert_eq!(
                summary,
                Summary {
                    total: 3,
                    passed: 1,
                    failed: 1,
                    skipped: 1
                }
            );
            assert!((summary.pass_rate() - 0.5).abs() < f64::EPSILON);
            assert!(!log.all_passed());
            assert_eq!(log.failures().len(), 1);
        }

        #[test]
        fn test_empty_log_passes() {
            let log = OutcomeLog::new();
            assert!(log.all_passed());
            assert!(log.is_empty());
            assert_eq!(log.summary().pass_rate(), 1.0);
        }

        #[test]
        fn test_json_record_flattens_outcome() {
            let mut log = OutcomeLog::new();
            let _ = log.append(Outcome::passed("a", "1", "1"));
            let json = serde_json::to_value(&log).unwrap();
            assert_eq!(json[0]["index"], 0);
            assert_eq!(json[0]["status"], "passed");
            assert!(json[0]["recorded_at"].is_string());
        }
    }
}
