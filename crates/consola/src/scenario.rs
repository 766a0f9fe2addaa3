//! Scenario documents: a YAML list of console steps.
//!
//! ```yaml
//! name: rectangle properties
//! fixture:
//!   template: projects/rectangle
//!   file: rectangle.qml
//! steps:
//!   - type: check
//!     input: width=66
//!     expected: "66"
//!     follow_up:
//!       input: width
//!   - type: capture
//!     input: height
//!     into: h
//!   - type: check
//!     input: height
//!     expected: ${h}
//! ```
//!
//! Values that look like numbers must be quoted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::check::Check;
use crate::config::HarnessConfig;
use crate::driver::Driver;
use crate::fixture::TemplateSpec;
use crate::query::ObjectQuery;
use crate::reporter::ScenarioReport;
use crate::result::{HarnessError, HarnessResult};
use crate::runner::{FilterCheck, ScenarioRunner};

/// A named sequence of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Known failure; the scenario is reported as skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xfail: Option<String>,
    /// Project template copied before the first step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<TemplateSpec>,
    /// Steps, in order
    pub steps: Vec<Step>,
}

/// One scenario step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Input with expected output, or a bare capture
    Check(Check),
    /// Select an object, then run checks in its scope
    Checks {
        /// Object to select
        scope: ObjectQuery,
        /// Checks evaluated against it
        items: Vec<Check>,
    },
    /// Capture the last output line into a variable
    Capture {
        /// Console input
        input: String,
        /// Variable name
        into: String,
    },
    /// Filter toggle check
    Filter(FilterCheck),
    /// Wait for an element's text to contain a fragment
    VerifyText {
        /// Element
        query: ObjectQuery,
        /// Fragment
        contains: String,
        /// Overrides the assertion timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Wait for a container's child texts
    VerifyItems {
        /// Container
        query: ObjectQuery,
        /// Child texts, in order
        items: Vec<String>,
        /// Overrides the assertion timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

impl Step {
    /// Short description used when the step is skipped
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Check(check) => check.describe(),
            Self::Checks { scope, items } => format!("{} checks in {scope}", items.len()),
            Self::Capture { input, into } => format!("{input} -> ${{{into}}}"),
            Self::Filter(filter) => format!("filter {}", filter.input),
            Self::VerifyText {
                query, contains, ..
            } => format!("{query} contains '{contains}'"),
            Self::VerifyItems { query, .. } => format!("{query} items"),
        }
    }

    fn queries(&self) -> Vec<&ObjectQuery> {
        match self {
            Self::Checks { scope, .. } => vec![scope],
            Self::Filter(filter) => vec![&filter.toggle],
            Self::VerifyText { query, .. } | Self::VerifyItems { query, .. } => vec![query],
            Self::Check(_) | Self::Capture { .. } => Vec::new(),
        }
    }
}

impl Scenario {
    /// Parse YAML and validate
    ///
    /// # Errors
    ///
    /// `Yaml` for malformed documents, `Scenario` or `InvalidQuery` for
    /// invalid content
    pub fn from_yaml_str(yaml: &str) -> HarnessResult<Self> {
        let scenario: Self = serde_yaml_ng::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load from a YAML file
    ///
    /// # Errors
    ///
    /// `Io`, or see [`Scenario::from_yaml_str`]
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let scenario = Self::from_yaml_str(&content)?;
        tracing::debug!(path = %path.display(), steps = scenario.steps.len(), "loaded scenario");
        Ok(scenario)
    }

    /// Check names, queries and capture targets
    ///
    /// # Errors
    ///
    /// The first problem found
    pub fn validate(&self) -> HarnessResult<()> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::scenario("scenario name must not be empty"));
        }
        if self.steps.is_empty() && self.xfail.is_none() {
            return Err(HarnessError::scenario(format!(
                "scenario '{}' has no steps",
                self.name
            )));
        }
        for step in &self.steps {
            for query in step.queries() {
                query.validate()?;
            }
            if let Step::Capture { into, .. } = step {
                if !is_identifier(into) {
                    return Err(HarnessError::scenario(format!(
                        "invalid variable name '{into}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Run against `driver` and return the report
    pub fn run<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        config: HarnessConfig,
        base_dir: &Path,
    ) -> ScenarioReport {
        let mut runner = ScenarioRunner::new(driver, config).with_name(&self.name);
        if let Err(err) = runner.run_scenario(self, base_dir) {
            tracing::error!(scenario = %self.name, error = %err, "scenario aborted");
        }
        runner.finish()
    }
}

// =============================================================================
// VARIABLES
// =============================================================================

/// Why a `${name}` reference could not be filled in
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionError {
    /// No capture step defined the variable
    #[error("Unknown variable '${{{name}}}'")]
    Unknown {
        /// Variable name
        name: String,
    },
    /// The capture defining it produced nothing
    #[error("Variable '${{{name}}}' has no value")]
    NoValue {
        /// Variable name
        name: String,
    },
}

impl From<SubstitutionError> for HarnessError {
    fn from(err: SubstitutionError) -> Self {
        Self::scenario(err.to_string())
    }
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid reference pattern")
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Values captured during a run
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, Option<String>>,
}

impl Variables {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a capture; `None` marks a capture that produced nothing
    pub fn set(&mut self, name: impl Into<String>, value: Option<String>) {
        let _ = self.values.insert(name.into(), value);
    }

    /// Value of `name`, if it was captured
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Option::as_deref)
    }

    /// Replace every `${name}` in `text`
    ///
    /// # Errors
    ///
    /// The first reference that is unknown or empty
    pub fn substitute(&self, text: &str) -> Result<String, SubstitutionError> {
        let pattern = reference_pattern();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in pattern.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();
            let value = match self.values.get(name) {
                None => {
                    return Err(SubstitutionError::Unknown {
                        name: name.to_string(),
                    })
                }
                Some(None) => {
                    return Err(SubstitutionError::NoValue {
                        name: name.to_string(),
                    })
                }
                Some(Some(value)) => value,
            };
            out.push_str(&text[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn substitute_all(&self, texts: &[String]) -> Result<Vec<String>, SubstitutionError> {
        texts.iter().map(|t| self.substitute(t)).collect()
    }

    fn substitute_check(&self, check: &Check) -> Result<Check, SubstitutionError> {
        Ok(Check {
            input: self.substitute(&check.input)?,
            expected: check
                .expected
                .as_deref()
                .map(|e| self.substitute(e))
                .transpose()?,
            follow_up: check
                .follow_up
                .as_deref()
                .map(|f| self.substitute_check(f).map(Box::new))
                .transpose()?,
        })
    }

    /// Step with every text field substituted
    ///
    /// # Errors
    ///
    /// See [`Variables::substitute`]
    pub fn resolve(&self, step: &Step) -> Result<Step, SubstitutionError> {
        Ok(match step {
            Step::Check(check) => Step::Check(self.substitute_check(check)?),
            Step::Checks { scope, items } => Step::Checks {
                scope: scope.clone(),
                items: items
                    .iter()
                    .map(|c| self.substitute_check(c))
                    .collect::<Result<_, _>>()?,
            },
            Step::Capture { input, into } => Step::Capture {
                input: self.substitute(input)?,
                into: into.clone(),
            },
            Step::Filter(filter) => Step::Filter(FilterCheck {
                input: self.substitute(&filter.input)?,
                expected: self.substitute_all(&filter.expected)?,
                toggle: filter.toggle.clone(),
                placeholder: self.substitute_all(&filter.placeholder)?,
            }),
            Step::VerifyText {
                query,
                contains,
                timeout_ms,
            } => Step::VerifyText {
                query: query.clone(),
                contains: self.substitute(contains)?,
                timeout_ms: *timeout_ms,
            },
            Step::VerifyItems {
                query,
                items,
                timeout_ms,
            } => Step::VerifyItems {
                query: query.clone(),
                items: self.substitute_all(items)?,
                timeout_ms: *timeout_ms,
            },
        })
    }
}
