//! Scenario Runner: executes checks against a console and records outcomes.
//!
//! ```text
//! Idle ─► Running(0) ─► Passed(0) ─► Running(1) ─► Failed(1) ─► … ─► Completed
//!              │                          │
//!              └──── fatal error ─────────┴──────────────────────────► Aborted
//! ```
//!
//! Every step is a soft assertion: a mismatch or a lookup timeout becomes a
//! `Failed` outcome and the run continues (unless the failure mode is
//! Andon Cord). Only fatal errors, such as a missing fixture, stop the run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::actuator::Actuator;
use crate::check::Check;
use crate::config::HarnessConfig;
use crate::console::ConsoleContext;
use crate::driver::Driver;
use crate::fixture::{FixtureManager, TemplateFixture};
use crate::locator::Locator;
use crate::outcome::{Outcome, OutcomeLog};
use crate::query::ObjectQuery;
use crate::reporter::{FailureMode, ScenarioReport};
use crate::result::{HarnessError, HarnessResult};
use crate::scenario::{Scenario, Step, SubstitutionError, Variables};
use crate::wait::poll;

/// Placeholder row a console shows for a statement without a value
pub const UNDEFINED_PLACEHOLDER: &str = "<undefined>";

/// What a capture yields when no output line can be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Return an empty string and carry on
    #[default]
    LastKnown,
    /// Record a failing outcome and return nothing
    Strict,
}

/// Runner state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum RunState {
    /// Nothing ran yet
    #[default]
    Idle,
    /// Step in progress
    Running(usize),
    /// Last finished step passed
    Passed(usize),
    /// Last finished step failed
    Failed(usize),
    /// Run finished
    Completed,
    /// Run stopped by a fatal error
    Aborted,
}

/// Filter toggle check.
///
/// In the console's untouched state, submitting `input` shows `expected`.
/// With the `toggle` control unchecked only `placeholder` remains; checking
/// it again restores `expected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCheck {
    /// Console input producing the filtered messages
    pub input: String,
    /// Produced rows with the filter on
    pub expected: Vec<String>,
    /// Checkable control of the message category
    pub toggle: ObjectQuery,
    /// Produced rows with the filter off
    #[serde(default = "default_placeholder")]
    pub placeholder: Vec<String>,
}

fn default_placeholder() -> Vec<String> {
    vec![UNDEFINED_PLACEHOLDER.to_string()]
}

impl FilterCheck {
    /// Create a filter check with the default placeholder
    #[must_use]
    pub fn new<S: Into<String>>(
        input: impl Into<String>,
        expected: impl IntoIterator<Item = S>,
        toggle: ObjectQuery,
    ) -> Self {
        Self {
            input: input.into(),
            expected: expected.into_iter().map(Into::into).collect(),
            toggle,
            placeholder: default_placeholder(),
        }
    }
}

/// Sequential executor of checks against one console
pub struct ScenarioRunner<'a, D: Driver + ?Sized> {
    driver: &'a mut D,
    locator: Locator,
    context: ConsoleContext,
    config: HarnessConfig,
    name: String,
    log: OutcomeLog,
    state: RunState,
    next_step: usize,
    halted: Option<String>,
    abort_reason: Option<String>,
    started: Instant,
    report: ScenarioReport,
}

impl<D: Driver + ?Sized> std::fmt::Debug for ScenarioRunner<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("outcomes", &self.log.len())
            .finish()
    }
}

impl<'a, D: Driver + ?Sized> ScenarioRunner<'a, D> {
    /// Create a runner borrowing `driver` for the duration of the run
    pub fn new(driver: &'a mut D, config: HarnessConfig) -> Self {
        Self {
            driver,
            locator: Locator::with_options(config.timeouts.locator_options()),
            context: config.console_context(),
            config,
            name: "scenario".to_string(),
            log: OutcomeLog::new(),
            state: RunState::Idle,
            next_step: 0,
            halted: None,
            abort_reason: None,
            started: Instant::now(),
            report: ScenarioReport::new("scenario"),
        }
    }

    /// Set the name used in the report
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the console context
    #[must_use]
    pub fn with_context(mut self, context: ConsoleContext) -> Self {
        self.context = context;
        self
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Outcomes so far
    #[must_use]
    pub const fn outcomes(&self) -> &OutcomeLog {
        &self.log
    }

    /// Whether a fatal error stopped the run
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self.state, RunState::Aborted)
    }

    /// Console context in use
    #[must_use]
    pub const fn context(&self) -> &ConsoleContext {
        &self.context
    }

    /// Locator in use
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    /// The driven application
    pub fn driver(&mut self) -> &mut D {
        &mut *self.driver
    }

    /// Stop the run; later steps are skipped
    pub fn abort(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!(reason = %reason, "run aborted");
        self.state = RunState::Aborted;
        self.abort_reason.get_or_insert(reason);
    }

    /// Record a step that was not executed
    pub fn skip(&mut self, description: impl Into<String>, reason: impl Into<String>) {
        let _ = self.log.append(Outcome::skipped(description, reason));
    }

    /// Record an error as a failed step
    ///
    /// # Errors
    ///
    /// Fatal errors abort the run and are returned
    pub fn record_error(&mut self, description: &str, error: HarnessError) -> HarnessResult<()> {
        self.step(description, "step to complete", |_| Err::<(), _>(error))
            .map(|_| ())
    }

    /// Finish the run and produce its report
    #[must_use]
    pub fn finish(self) -> ScenarioReport {
        let state = if self.is_aborted() {
            RunState::Aborted
        } else {
            RunState::Completed
        };
        tracing::info!(scenario = %self.name, summary = %self.log.summary(), "run finished");
        ScenarioReport {
            name: self.name,
            state,
            outcomes: self.log,
            duration: self.started.elapsed(),
            abort_reason: self.abort_reason,
            ..self.report
        }
    }

    fn halt_reason(&self) -> Option<String> {
        if let Some(reason) = &self.abort_reason {
            return Some(format!("run aborted: {reason}"));
        }
        self.halted.clone()
    }

    fn settle(&mut self, index: usize, failed: bool) {
        if !failed {
            self.state = RunState::Passed(index);
            return;
        }
        self.state = RunState::Failed(index);
        if self.config.failure_mode == FailureMode::AndonCord && self.halted.is_none() {
            tracing::warn!(step = index, "andon cord pulled");
            self.halted = Some(format!("halted after failed step {index}"));
        }
    }

    /// Run one step, turning non-fatal errors into failed outcomes
    fn step<T>(
        &mut self,
        description: &str,
        expected: &str,
        body: impl FnOnce(&mut Self) -> HarnessResult<T>,
    ) -> HarnessResult<Option<T>> {
        if let Some(reason) = self.halt_reason() {
            self.skip(description, reason);
            return Ok(None);
        }
        let index = self.next_step;
        self.next_step += 1;
        self.state = RunState::Running(index);
        let failed_before = self.log.summary().failed;
        tracing::debug!(step = index, description, "step");

        match body(self) {
            Ok(value) => {
                let failed = self.log.summary().failed > failed_before;
                self.settle(index, failed);
                Ok(Some(value))
            }
            Err(err) if err.is_fatal() => {
                self.abort(err.to_string());
                Err(err)
            }
            Err(err) => {
                let _ = self
                    .log
                    .append(Outcome::failed(description, expected, Some(err.to_string())));
                self.settle(index, true);
                if err.is_action_error() && self.config.abort_on_action_error {
                    self.abort(err.to_string());
                }
                Ok(None)
            }
        }
    }

    /// Clear the console after `result`, keeping the first error
    fn then_clear<T>(&mut self, result: HarnessResult<T>) -> HarnessResult<T> {
        let cleared = self.context.clear(&mut *self.driver, &self.locator);
        match (result, cleared) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(clear_err)) => {
                tracing::warn!(error = %clear_err, "clear failed");
                Err(err)
            }
        }
    }

    // =========================================================================
    // CHECKS
    // =========================================================================

    /// Run a check and its follow-ups.
    ///
    /// Returns the captured line for a check without an expected value.
    ///
    /// # Errors
    ///
    /// Only fatal errors; everything else is recorded as an outcome
    pub fn run_check(&mut self, check: &Check) -> HarnessResult<Option<String>> {
        let description = check.describe();
        let expected = check.expected.as_deref().unwrap_or("captured output");
        let captured = self
            .step(&description, expected, |r| {
                let result = r.check_once(check, &description);
                r.then_clear(result)
            })?
            .flatten();
        if let Some(follow_up) = check.resolved_follow_up() {
            let _ = self.run_check(&follow_up)?;
        }
        Ok(captured)
    }

    /// Capture the last output line of `input`
    ///
    /// # Errors
    ///
    /// Only fatal errors
    pub fn capture(&mut self, input: &str) -> HarnessResult<Option<String>> {
        self.run_check(&Check::capture(input))
    }

    /// Select `scope` (e.g. an object in a tree view), then run `checks`
    ///
    /// # Errors
    ///
    /// Only fatal errors
    pub fn run_checks(&mut self, scope: &ObjectQuery, checks: &[Check]) -> HarnessResult<()> {
        let description = format!("select {scope}");
        let selected = self.step(&description, "selectable element", |r| {
            let handle = r.locator.locate(&*r.driver, scope)?;
            Actuator::click(&mut *r.driver, handle)
        })?;
        if selected.is_none() {
            for check in checks {
                self.skip(check.describe(), format!("{scope} was not selected"));
            }
            return Ok(());
        }
        for check in checks {
            let _ = self.run_check(check)?;
        }
        Ok(())
    }

    fn check_once(&mut self, check: &Check, description: &str) -> HarnessResult<Option<String>> {
        self.context
            .submit(&mut *self.driver, &self.locator, &check.input)?;
        match &check.expected {
            None => self.read_capture(description),
            Some(expected) => {
                self.assert_output(description, expected)?;
                Ok(None)
            }
        }
    }

    fn read_capture(&mut self, description: &str) -> HarnessResult<Option<String>> {
        let missing = match self.context.last_output(&*self.driver, &self.locator) {
            Ok(Some(line)) => return Ok(Some(line)),
            Ok(None) => None,
            Err(err) if err.is_soft() => Some(err),
            Err(err) => return Err(err),
        };
        match self.config.capture_mode {
            CaptureMode::LastKnown => {
                tracing::warn!(description, error = ?missing.map(|e| e.to_string()), "nothing to capture");
                Ok(Some(String::new()))
            }
            CaptureMode::Strict => {
                let _ = self
                    .log
                    .append(Outcome::failed(description, "an output line", None));
                Ok(None)
            }
        }
    }

    /// Wait for a produced row equal to `expected`.
    ///
    /// Echoed input and the trailing editable row never count.
    fn assert_output(&mut self, description: &str, expected: &str) -> HarnessResult<()> {
        let mut produced = Vec::new();
        let polled = poll(
            self.config.timeouts.assert_timeout(),
            self.locator.options().poll_interval,
            || {
                let rows = self.context.rows(&*self.driver, &self.locator)?;
                produced = self.context.produced_rows(rows);
                Ok(produced.iter().any(|row| row.as_str() == expected).then_some(()))
            },
        );
        let outcome = match polled {
            Ok(Ok(_)) => Outcome::passed(description, expected, expected),
            Ok(Err(_)) => Outcome::failed(description, expected, produced.pop()),
            Err(err) if err.is_soft() => Outcome::failed(description, expected, None),
            Err(err) => return Err(err),
        };
        let _ = self.log.append(outcome);
        Ok(())
    }

    // =========================================================================
    // FILTERS
    // =========================================================================

    /// Check that toggling a message filter hides and restores its rows
    ///
    /// # Errors
    ///
    /// Only fatal errors
    pub fn run_filter_check(&mut self, filter: &FilterCheck) -> HarnessResult<()> {
        let description = format!("filter {}", filter.input);
        let expected = format!("{:?}", filter.expected);
        let _ = self.step(&description, &expected, |r| {
            let result = r.filter_once(filter);
            r.then_clear(result)
        })?;
        Ok(())
    }

    fn set_toggle(&mut self, toggle: &ObjectQuery, checked: bool) -> HarnessResult<()> {
        let handle = self.locator.locate(&*self.driver, toggle)?;
        let _ = Actuator::ensure_checked(&mut *self.driver, handle, checked)?;
        Ok(())
    }

    fn filter_once(&mut self, filter: &FilterCheck) -> HarnessResult<()> {
        self.context
            .submit(&mut *self.driver, &self.locator, &filter.input)?;
        self.expect_rows(&format!("{} [shown]", filter.input), &filter.expected)?;
        self.set_toggle(&filter.toggle, false)?;
        self.expect_rows(&format!("{} [filtered]", filter.input), &filter.placeholder)?;
        self.set_toggle(&filter.toggle, true)?;
        self.expect_rows(&format!("{} [restored]", filter.input), &filter.expected)?;
        Ok(())
    }

    /// Wait until the produced rows equal `target` and record the comparison
    fn expect_rows(&mut self, description: &str, target: &[String]) -> HarnessResult<bool> {
        let mut last = Vec::new();
        let polled = poll(
            self.config.timeouts.assert_timeout(),
            self.locator.options().poll_interval,
            || {
                let rows = self.context.rows(&*self.driver, &self.locator)?;
                last = self.context.produced_rows(rows);
                Ok((last == target).then_some(()))
            },
        )?;
        let expected = format!("{target:?}");
        let actual = format!("{last:?}");
        let outcome = if polled.is_ok() {
            Outcome::passed(description, expected, actual)
        } else {
            Outcome::failed(description, expected, Some(actual))
        };
        let passed = outcome.is_passed();
        let _ = self.log.append(outcome);
        Ok(passed)
    }

    // =========================================================================
    // STATE VERIFICATION
    // =========================================================================

    /// Wait until an element's text contains `fragment`
    ///
    /// # Errors
    ///
    /// Only fatal errors
    pub fn verify_text(
        &mut self,
        query: &ObjectQuery,
        fragment: &str,
        timeout: Duration,
    ) -> HarnessResult<bool> {
        let description = format!("{query} contains '{fragment}'");
        let passed = self.step(&description, fragment, |r| {
            let mut last = None;
            let polled = poll(timeout, r.locator.options().poll_interval, || {
                match r.locator.resolve(&*r.driver, query, Duration::ZERO) {
                    Ok(handle) => {
                        let text = r.driver.text(handle)?;
                        let found = text.contains(fragment);
                        last = Some(text);
                        Ok(found.then_some(()))
                    }
                    Err(err) if err.is_soft() => Ok(None),
                    Err(err) => Err(err),
                }
            })?;
            let outcome = match (polled, last) {
                (Ok(_), Some(text)) => Outcome::passed(&description, fragment, text),
                (_, last) => Outcome::failed(&description, fragment, last),
            };
            let passed = outcome.is_passed();
            let _ = r.log.append(outcome);
            Ok(passed)
        })?;
        Ok(passed.unwrap_or(false))
    }

    /// Wait until a container's child texts equal `items`, in order
    ///
    /// # Errors
    ///
    /// Only fatal errors
    pub fn verify_items(
        &mut self,
        query: &ObjectQuery,
        items: &[String],
        timeout: Duration,
    ) -> HarnessResult<bool> {
        let description = format!("{query} items");
        let expected = format!("{items:?}");
        let passed = self.step(&description, &expected, |r| {
            let mut last = None;
            let polled = poll(timeout, r.locator.options().poll_interval, || {
                match r.locator.resolve(&*r.driver, query, Duration::ZERO) {
                    Ok(handle) => {
                        let texts = r.driver.child_texts(handle)?;
                        let equal = texts == items;
                        last = Some(texts);
                        Ok(equal.then_some(()))
                    }
                    Err(err) if err.is_soft() => Ok(None),
                    Err(err) => Err(err),
                }
            })?;
            let actual = last.map(|texts| format!("{texts:?}"));
            let outcome = match (polled, actual) {
                (Ok(_), Some(actual)) => Outcome::passed(&description, &expected, actual),
                (_, actual) => Outcome::failed(&description, &expected, actual),
            };
            let passed = outcome.is_passed();
            let _ = r.log.append(outcome);
            Ok(passed)
        })?;
        Ok(passed.unwrap_or(false))
    }

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    /// Run a scenario document.
    ///
    /// Fixtures are set up before any step runs; relative template paths
    /// resolve against `base_dir`.
    ///
    /// # Errors
    ///
    /// Fatal errors, after the run has been marked aborted
    pub fn run_scenario(&mut self, scenario: &Scenario, base_dir: &Path) -> HarnessResult<()> {
        self.name = scenario.name.clone();
        if let Some(reason) = &scenario.xfail {
            tracing::info!(scenario = %scenario.name, reason = %reason, "expected failure, skipping");
            self.skip(&scenario.name, format!("xfail: {reason}"));
            return Ok(());
        }

        let mut fixtures = FixtureManager::new();
        if let Some(spec) = &scenario.fixture {
            fixtures.register(TemplateFixture::from_spec(spec, base_dir));
        }
        if let Err(err) = fixtures.setup_all() {
            self.abort(err.to_string());
            return Err(err);
        }

        let result = self.run_steps(&scenario.steps);
        if let Err(err) = fixtures.teardown_all() {
            tracing::warn!(error = %err, "fixture teardown failed");
        }
        result
    }

    fn run_steps(&mut self, steps: &[Step]) -> HarnessResult<()> {
        let mut variables = Variables::new();
        for step in steps {
            let step = match variables.resolve(step) {
                Ok(resolved) => resolved,
                Err(SubstitutionError::NoValue { name }) => {
                    self.skip(step.describe(), format!("capture '{name}' produced no output"));
                    continue;
                }
                Err(err) => {
                    self.record_error(&step.describe(), err.into())?;
                    continue;
                }
            };
            match step {
                Step::Check(check) => {
                    let _ = self.run_check(&check)?;
                }
                Step::Checks { scope, items } => self.run_checks(&scope, &items)?,
                Step::Capture { input, into } => {
                    let value = self.capture(&input)?;
                    variables.set(into, value);
                }
                Step::Filter(filter) => self.run_filter_check(&filter)?,
                Step::VerifyText {
                    query,
                    contains,
                    timeout_ms,
                } => {
                    let timeout = self.timeout_or_assert(timeout_ms);
                    let _ = self.verify_text(&query, &contains, timeout)?;
                }
                Step::VerifyItems {
                    query,
                    items,
                    timeout_ms,
                } => {
                    let timeout = self.timeout_or_assert(timeout_ms);
                    let _ = self.verify_items(&query, &items, timeout)?;
                }
            }
        }
        Ok(())
    }

    fn timeout_or_assert(&self, timeout_ms: Option<u64>) -> Duration {
        timeout_ms.map_or(self.config.timeouts.assert_timeout(), Duration::from_millis)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::TimeoutConfig;
    use crate::mock::console::{LOG_FILTER_TOOL_TIP, WARNING_FILTER_TOOL_TIP};
    use crate::mock::{ConsoleApp, MockDriver};

    fn fast_config() -> HarnessConfig {
        HarnessConfig {
            timeouts: TimeoutConfig {
                assert_ms: 60,
                output_ms: 40,
                locate_ms: 60,
                poll_interval_ms: 5,
            },
            ..HarnessConfig::default()
        }
    }

    fn rectangle(n: usize) -> ObjectQuery {
        ObjectQuery::of_type("TreeItem")
            .with_text("Rectangle")
            .occurrence(n)
    }

    mod check_tests {
        use super::*;

        #[test]
        fn test_passing_check_with_follow_up() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let _ = runner
                .run_check(&Check::new("width=66", "66").then_input("width"))
                .unwrap();
            let report = runner.finish();
            assert_eq!(report.summary().passed, 2);
            assert!(report.passed());
            assert_eq!(report.state, RunState::Completed);
        }

        #[test]
        fn test_mismatch_records_last_output() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let _ = runner.run_check(&Check::new("height", "999")).unwrap();
            assert_eq!(runner.state(), RunState::Failed(0));
            let outcome = runner.outcomes().last().unwrap().clone();
            assert_eq!(
                outcome,
                Outcome::failed("height => 999", "999", Some("360".to_string()))
            );
        }

        #[test]
        fn test_echoed_input_does_not_count_as_output() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let _ = runner.run_check(&Check::new("1+1", "1+1")).unwrap();
            assert_eq!(
                runner.outcomes().last().unwrap(),
                &Outcome::failed("1+1 => 1+1", "1+1", Some("2".to_string()))
            );
        }

        #[test]
        fn test_trailing_row_does_not_count_as_output() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let _ = runner.run_check(&Check::new("width", "")).unwrap();
            assert_eq!(
                runner.outcomes().last().unwrap(),
                &Outcome::failed("width => ", "", Some("360".to_string()))
            );
        }

        #[test]
        fn test_empty_output_line_matches_empty_expected() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let _ = runner.run_check(&Check::new("console.log('')", "")).unwrap();
            assert!(runner.outcomes().last().unwrap().is_passed());
        }

        #[test]
        fn test_console_cleared_after_each_check() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let _ = runner.run_check(&Check::new("height", "999")).unwrap();
            let _ = runner.run_check(&Check::new("1+1", "2")).unwrap();
            let ctx = runner.context().clone();
            let locator = *runner.locator();
            assert_eq!(ctx.rows(&*runner.driver(), &locator).unwrap(), vec![""]);
        }

        #[test]
        fn test_capture_returns_last_line() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            assert_eq!(runner.capture("width").unwrap().as_deref(), Some("360"));
            assert!(runner.outcomes().is_empty());
        }

        #[test]
        fn test_capture_without_console_fails_step() {
            let mut driver = MockDriver::new();
            let _ = driver.add_root(&[("type", "MainWindow")]);
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            assert_eq!(runner.capture("x").unwrap(), None);
            let outcome = runner.outcomes().last().unwrap();
            assert!(outcome.is_failed());
            assert!(outcome.detail().contains("No element matching"));
        }

        fn echo_everything() -> ConsoleContext {
            // every row counts as echo, so nothing is ever produced
            ConsoleContext {
                echo_rows: 3,
                ..fast_config().console_context()
            }
        }

        #[test]
        fn test_last_known_capture_of_empty_output() {
            let mut driver = ConsoleApp::launch();
            let mut runner =
                ScenarioRunner::new(&mut driver, fast_config()).with_context(echo_everything());
            assert_eq!(runner.capture("1").unwrap().as_deref(), Some(""));
            assert!(runner.outcomes().is_empty());
            assert_eq!(runner.state(), RunState::Passed(0));
        }

        #[test]
        fn test_strict_capture_of_empty_output() {
            let mut driver = ConsoleApp::launch();
            let config = HarnessConfig {
                capture_mode: CaptureMode::Strict,
                ..fast_config()
            };
            let mut runner = ScenarioRunner::new(&mut driver, config).with_context(echo_everything());
            assert_eq!(runner.capture("1").unwrap(), None);
            assert_eq!(
                runner.outcomes().last().unwrap(),
                &Outcome::failed("1 (capture)", "an output line", None)
            );
            assert_eq!(runner.state(), RunState::Failed(0));
        }
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn test_andon_cord_skips_after_failure() {
            let mut driver = ConsoleApp::launch();
            let config = HarnessConfig {
                failure_mode: FailureMode::AndonCord,
                ..fast_config()
            };
            let mut runner = ScenarioRunner::new(&mut driver, config);
            let _ = runner.run_check(&Check::new("height", "1")).unwrap();
            let _ = runner.run_check(&Check::new("width", "360")).unwrap();
            let summary = runner.outcomes().summary();
            assert_eq!((summary.failed, summary.skipped, summary.passed), (1, 1, 0));
            assert_eq!(runner.state(), RunState::Failed(0));
        }

        #[test]
        fn test_collect_all_keeps_going() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let _ = runner.run_check(&Check::new("height", "1")).unwrap();
            let _ = runner.run_check(&Check::new("width", "360")).unwrap();
            assert_eq!(runner.state(), RunState::Passed(1));
            let summary = runner.outcomes().summary();
            assert_eq!((summary.failed, summary.passed), (1, 1));
        }

        #[test]
        fn test_dispatch_failure_fails_check() {
            let mut driver = ConsoleApp::launch();
            driver.reject_dispatch(true);
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let _ = runner.run_check(&Check::new("width", "360")).unwrap();
            let outcome = runner.outcomes().last().unwrap();
            assert!(outcome.is_failed());
            assert!(outcome.detail().contains("Dispatch of click failed"));
            assert!(!runner.is_aborted());
        }

        #[test]
        fn test_abort_on_action_error() {
            let mut driver = ConsoleApp::launch();
            driver.reject_dispatch(true);
            let config = HarnessConfig {
                abort_on_action_error: true,
                ..fast_config()
            };
            let mut runner = ScenarioRunner::new(&mut driver, config);
            let _ = runner.run_check(&Check::new("width", "360")).unwrap();
            let _ = runner.run_check(&Check::new("height", "360")).unwrap();
            assert!(runner.is_aborted());
            let report = runner.finish();
            assert_eq!(report.state, RunState::Aborted);
            assert_eq!(report.summary().skipped, 1);
            assert_eq!(report.exit_code(), 2);
        }

        #[test]
        fn test_unselectable_scope_skips_checks() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            runner
                .run_checks(&rectangle(9), &[Check::new("width", "1"), Check::new("x", "2")])
                .unwrap();
            let summary = runner.outcomes().summary();
            assert_eq!((summary.failed, summary.skipped), (1, 2));
        }
    }

    mod scope_tests {
        use super::*;

        #[test]
        fn test_checks_run_against_selected_object() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            runner
                .run_checks(
                    &rectangle(2),
                    &[Check::new("width", "100"), Check::new("color", "#ff0000")],
                )
                .unwrap();
            assert!(runner.outcomes().all_passed());
            assert_eq!(runner.outcomes().summary().passed, 2);
        }
    }

    mod filter_tests {
        use super::*;

        #[test]
        fn test_warning_filter_law() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let filter = FilterCheck::new(
                "console.warn(\"warning message\")",
                ["warning message", "<undefined>"],
                ObjectQuery::of_type("QToolButton").with_tool_tip(WARNING_FILTER_TOOL_TIP),
            );
            runner.run_filter_check(&filter).unwrap();
            let descriptions: Vec<_> = runner
                .outcomes()
                .outcomes()
                .map(|o| o.description().to_string())
                .collect();
            assert_eq!(descriptions.len(), 3);
            assert!(descriptions[1].ends_with("[filtered]"));
            assert!(runner.outcomes().all_passed());
        }

        #[test]
        fn test_wrong_category_fails_filtered_phase() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let filter = FilterCheck::new(
                "console.warn(\"w\")",
                ["w", "<undefined>"],
                ObjectQuery::of_type("QToolButton").with_tool_tip(LOG_FILTER_TOOL_TIP),
            );
            runner.run_filter_check(&filter).unwrap();
            let summary = runner.outcomes().summary();
            assert_eq!((summary.passed, summary.failed), (2, 1));
            assert_eq!(runner.state(), RunState::Failed(0));
        }

        #[test]
        fn test_hidden_category_fails_shown_phase() {
            let mut driver = ConsoleApp::launch();
            let toggle =
                ObjectQuery::of_type("QToolButton").with_tool_tip(WARNING_FILTER_TOOL_TIP);
            let button = Locator::new().locate(&driver, &toggle).unwrap();
            let _ = Actuator::ensure_checked(&mut driver, button, false).unwrap();

            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let filter = FilterCheck::new("console.warn(\"w\")", ["w", "<undefined>"], toggle);
            runner.run_filter_check(&filter).unwrap();
            let first = runner.outcomes().outcomes().next().unwrap().clone();
            assert!(first.is_failed());
            assert!(first.description().ends_with("[shown]"));
            assert_eq!(
                first.detail(),
                "expected '[\"w\", \"<undefined>\"]', got '[\"<undefined>\"]'"
            );
            assert_eq!(runner.state(), RunState::Failed(0));
        }
    }

    mod verify_tests {
        use super::*;
        use crate::mock::console::{FINISHED_MESSAGE, PRESET_ITEM};

        #[test]
        fn test_quit_is_observed() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let _ = runner.run_check(&Check::new("Qt.quit()", "<undefined>")).unwrap();
            assert!(runner
                .verify_text(
                    &ObjectQuery::of_type("OutputWindow"),
                    FINISHED_MESSAGE,
                    Duration::from_millis(50)
                )
                .unwrap());
            assert!(runner
                .verify_items(
                    &ObjectQuery::of_type("QComboBox"),
                    &[PRESET_ITEM.to_string()],
                    Duration::from_millis(50)
                )
                .unwrap());
            assert!(runner.outcomes().all_passed());
        }

        #[test]
        fn test_verify_text_timeout_records_last_text() {
            let mut driver = ConsoleApp::launch();
            let mut runner = ScenarioRunner::new(&mut driver, fast_config());
            let passed = runner
                .verify_text(
                    &ObjectQuery::of_type("OutputWindow"),
                    FINISHED_MESSAGE,
                    Duration::from_millis(20),
                )
                .unwrap();
            assert!(!passed);
            match runner.outcomes().last().unwrap() {
                Outcome::Failed { actual, .. } => {
                    assert_eq!(actual.as_deref(), Some("Debugging starts\n"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
