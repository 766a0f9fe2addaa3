//! Console context: page object for the interactive console surface.
//!
//! Bundles the queries that identify the console view, its editor, the
//! editable input row and the clear button, plus the row layout conventions
//! needed to tell echoed input apart from produced output.
//!
//! ```text
//! ConsoleView
//! ├── row  "width=66"   <- echo_rows (input echo)
//! ├── row  "66"         <- produced output
//! └── row  ""           <- trailing_rows (fresh editable row)
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::actuator::{Actuator, RETURN_KEY};
use crate::driver::Driver;
use crate::locator::Locator;
use crate::query::ObjectQuery;
use crate::result::HarnessResult;
use crate::wait::poll;

/// Default time to wait for output rows (2 seconds)
pub const DEFAULT_OUTPUT_TIMEOUT_MS: u64 = 2000;

/// Page object describing a console surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleContext {
    /// The row container
    pub view: ObjectQuery,
    /// Text editor receiving typed input
    pub editor: ObjectQuery,
    /// Editable row that gives the editor focus
    pub input_row: ObjectQuery,
    /// Button that empties the console
    pub clear_button: ObjectQuery,
    /// Key that submits the typed input
    pub submit_key: String,
    /// Leading rows echoing the input
    pub echo_rows: usize,
    /// Trailing rows that are not output
    pub trailing_rows: usize,
    /// Rows expected once output is complete
    pub min_rows: usize,
    /// Time to wait for `min_rows`; set from `timeouts.output_ms` in config
    #[serde(skip)]
    pub output_timeout_ms: u64,
}

impl Default for ConsoleContext {
    fn default() -> Self {
        let view = ObjectQuery::of_type("ConsoleView");
        Self {
            input_row: ObjectQuery::of_type("ConsoleItem")
                .with_property("editable", "1")
                .inside(view.clone()),
            view,
            editor: ObjectQuery::of_type("ConsoleEdit"),
            clear_button: ObjectQuery::of_type("QToolButton").with_text("Clear"),
            submit_key: RETURN_KEY.to_string(),
            echo_rows: 1,
            trailing_rows: 1,
            min_rows: 3,
            output_timeout_ms: DEFAULT_OUTPUT_TIMEOUT_MS,
        }
    }
}

impl ConsoleContext {
    /// Create a context with the default console layout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set output timeout
    #[must_use]
    pub const fn with_output_timeout(mut self, timeout_ms: u64) -> Self {
        self.output_timeout_ms = timeout_ms;
        self
    }

    /// Output timeout as a duration
    #[must_use]
    pub const fn output_timeout(&self) -> Duration {
        Duration::from_millis(self.output_timeout_ms)
    }

    /// Strip echo and trailing rows from a full row list
    #[must_use]
    pub fn produced_rows(&self, rows: Vec<String>) -> Vec<String> {
        let end = rows.len().saturating_sub(self.trailing_rows);
        rows.into_iter().take(end).skip(self.echo_rows).collect()
    }

    /// Focus the input row, type `input` and submit it
    ///
    /// # Errors
    ///
    /// Lookup failures, `InvalidInput`, `StaleHandle` or `DispatchFailed`
    pub fn submit<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        locator: &Locator,
        input: &str,
    ) -> HarnessResult<()> {
        let row = locator.locate(driver, &self.input_row)?;
        Actuator::click(driver, row)?;
        let editor = locator.locate(driver, &self.editor)?;
        Actuator::type_text(driver, editor, input)?;
        Actuator::type_key(driver, editor, &self.submit_key)?;
        tracing::debug!(input, "submitted");
        Ok(())
    }

    /// Texts of all rows, in order
    ///
    /// # Errors
    ///
    /// Lookup failures for the view
    pub fn rows<D: Driver + ?Sized>(&self, driver: &D, locator: &Locator) -> HarnessResult<Vec<String>> {
        let view = locator.locate(driver, &self.view)?;
        driver.child_texts(view)
    }

    /// Rows without the trailing editable row.
    ///
    /// Waits up to the output timeout for `min_rows` rows, then returns
    /// whatever is there.
    ///
    /// # Errors
    ///
    /// Lookup failures for the view
    pub fn output<D: Driver + ?Sized>(&self, driver: &D, locator: &Locator) -> HarnessResult<Vec<String>> {
        let polled = poll(self.output_timeout(), locator.options().poll_interval, || {
            let rows = self.rows(driver, locator)?;
            Ok((rows.len() >= self.min_rows).then_some(rows))
        })?;
        let mut rows = match polled {
            Ok((rows, _)) => rows,
            Err(elapsed) => {
                tracing::debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    min_rows = self.min_rows,
                    "output incomplete"
                );
                self.rows(driver, locator)?
            }
        };
        rows.truncate(rows.len().saturating_sub(self.trailing_rows));
        Ok(rows)
    }

    /// Output without the echoed input rows
    ///
    /// # Errors
    ///
    /// See [`ConsoleContext::output`]
    pub fn produced<D: Driver + ?Sized>(&self, driver: &D, locator: &Locator) -> HarnessResult<Vec<String>> {
        let output = self.output(driver, locator)?;
        Ok(output.into_iter().skip(self.echo_rows).collect())
    }

    /// Last produced line, if any
    ///
    /// # Errors
    ///
    /// See [`ConsoleContext::output`]
    pub fn last_output<D: Driver + ?Sized>(
        &self,
        driver: &D,
        locator: &Locator,
    ) -> HarnessResult<Option<String>> {
        Ok(self.produced(driver, locator)?.pop())
    }

    /// Click the clear button and wait for the view to empty
    ///
    /// # Errors
    ///
    /// Lookup or dispatch failures
    pub fn clear<D: Driver + ?Sized>(&self, driver: &mut D, locator: &Locator) -> HarnessResult<()> {
        let button = locator.locate(driver, &self.clear_button)?;
        Actuator::click(driver, button)?;
        let polled = poll(self.output_timeout(), locator.options().poll_interval, || {
            let rows = self.rows(driver, locator)?;
            Ok((rows.len() <= self.trailing_rows).then_some(()))
        })?;
        if polled.is_err() {
            tracing::warn!("console did not clear");
        }
        Ok(())
    }
}
