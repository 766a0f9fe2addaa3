//! Consola: scenario-driven test harness for interactive GUI consoles.
//!
//! Drives a console widget the way a user would (focus the input row, type,
//! press Return) and checks what appears in the view. Every check is a soft
//! assertion: a mismatch is recorded with both the expected and the observed
//! line, and the run continues.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scenario (YAML) ──► ScenarioRunner ──► ScenarioReport ──► Reporter│
//! │                            │                                      │
//! │                 ConsoleContext (page object)                      │
//! │                  │                      │                         │
//! │             Locator + poll         Actuator                       │
//! │                  │                      │                         │
//! │                  └──────► Driver ◄──────┘                         │
//! │                       (MockDriver / ConsoleApp)                   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use consola::{Check, ConsoleApp, HarnessConfig, ScenarioRunner};
//!
//! let mut driver = ConsoleApp::launch();
//! let mut runner = ScenarioRunner::new(&mut driver, HarnessConfig::default());
//! runner.run_check(&Check::new("width=66", "66").then_input("width"))?;
//! let report = runner.finish();
//! assert!(report.passed());
//! # Ok::<(), consola::HarnessError>(())
//! ```

#![warn(missing_docs)]

mod actuator;
mod check;
mod config;
mod console;
mod driver;
mod fixture;
mod locator;
pub mod logging;
pub mod mock;
mod outcome;
mod query;
mod reporter;
mod result;
mod runner;
mod scenario;
mod wait;

pub use actuator::{normalize_key, Actuator, CHECKED_KEY, RETURN_KEY};
pub use check::Check;
pub use config::{HarnessConfig, TimeoutConfig, DEFAULT_ASSERT_TIMEOUT_MS};
pub use console::{ConsoleContext, DEFAULT_OUTPUT_TIMEOUT_MS};
pub use driver::{ensure_current, Ancestry, Driver, ElementHandle, ElementNode};
pub use fixture::{Fixture, FixtureManager, FixtureState, TemplateFixture, TemplateSpec};
pub use locator::{Locator, LocatorOptions, DEFAULT_TIMEOUT_MS};
pub use logging::LogFormat;
pub use mock::{ConsoleApp, MockDriver};
pub use outcome::{Outcome, OutcomeLog, OutcomeRecord, Summary, NO_OUTPUT};
pub use query::{
    Matcher, ObjectQuery, NAME_KEY, TEXT_KEY, TOOL_TIP_KEY, TYPE_KEY, VISIBLE_KEY,
};
pub use reporter::{FailureMode, Reporter, ScenarioReport};
pub use result::{HarnessError, HarnessResult};
pub use runner::{CaptureMode, FilterCheck, RunState, ScenarioRunner, UNDEFINED_PLACEHOLDER};
pub use scenario::{Scenario, Step, SubstitutionError, Variables};
pub use wait::{
    poll, wait_until, FnCondition, WaitCondition, WaitOptions, WaitResult, Waiter,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

/// Common imports
pub mod prelude {
    pub use super::{
        Actuator, Check, ConsoleApp, ConsoleContext, Driver, ElementHandle, FailureMode,
        FilterCheck, HarnessConfig, HarnessError, HarnessResult, Locator, MockDriver,
        ObjectQuery, Outcome, Reporter, RunState, Scenario, ScenarioReport, ScenarioRunner,
    };
}
