//! Wait Mechanisms
//!
//! Bounded polling for synchronization with an application that processes
//! input on its own loop. There is no event subscription: every wait
//! re-evaluates a predicate until it holds or the timeout elapses.

use crate::result::{HarnessError, HarnessResult};
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT CONDITION TRAIT
// =============================================================================

/// Trait for described wait conditions
pub trait WaitCondition {
    /// Check if the condition is satisfied
    fn check(&self) -> bool;

    /// Get description for error messages
    fn description(&self) -> String;
}

/// A function-based wait condition
pub struct FnCondition<F: Fn() -> bool> {
    func: F,
    description: String,
}

impl<F: Fn() -> bool> std::fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F: Fn() -> bool> FnCondition<F> {
    /// Create a new function condition
    pub fn new(func: F, description: impl Into<String>) -> Self {
        Self {
            func,
            description: description.into(),
        }
    }
}

impl<F: Fn() -> bool> WaitCondition for FnCondition<F> {
    fn check(&self) -> bool {
        (self.func)()
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Outcome of a bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// Predicate became true
    Satisfied {
        /// Time until it held
        elapsed: Duration,
    },
    /// Timeout elapsed first
    TimedOut {
        /// Time spent waiting
        elapsed: Duration,
    },
}

impl WaitResult {
    /// Whether the predicate held
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Time spent waiting
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Satisfied { elapsed } | Self::TimedOut { elapsed } => *elapsed,
        }
    }

    /// Treat a timeout as a hard failure
    ///
    /// # Errors
    ///
    /// `Timeout` when the wait timed out
    pub fn into_result(self, waited_for: impl Into<String>) -> HarnessResult<Duration> {
        match self {
            Self::Satisfied { elapsed } => Ok(elapsed),
            Self::TimedOut { elapsed } => Err(HarnessError::Timeout {
                ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                waited_for: waited_for.into(),
            }),
        }
    }
}

// =============================================================================
// POLLING CORE
// =============================================================================

/// Run `attempt` until it yields a value or `timeout` elapses.
///
/// The first attempt happens immediately. Sleeps never overshoot the
/// deadline, and a zero timeout means exactly one attempt with no sleep.
/// Errors from `attempt` stop the poll at once.
///
/// # Errors
///
/// Whatever `attempt` returns
pub fn poll<T, F>(
    timeout: Duration,
    poll_interval: Duration,
    mut attempt: F,
) -> HarnessResult<Result<(T, Duration), Duration>>
where
    F: FnMut() -> HarnessResult<Option<T>>,
{
    let start = Instant::now();
    let interval = poll_interval.max(Duration::from_millis(1));
    loop {
        if let Some(value) = attempt()? {
            return Ok(Ok((value, start.elapsed())));
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(Err(elapsed));
        }
        std::thread::sleep(interval.min(timeout - elapsed));
    }
}

// =============================================================================
// WAITER
// =============================================================================

/// Waiter for synchronization operations
#[derive(Debug, Clone, Copy, Default)]
pub struct Waiter {
    options: WaitOptions,
}

impl Waiter {
    /// Create a new waiter with default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom options
    #[must_use]
    pub const fn with_options(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Default options
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Poll `predicate` until it holds or `timeout` elapses
    pub fn wait_for<F>(&self, mut predicate: F, timeout: Duration, poll_interval: Duration) -> WaitResult
    where
        F: FnMut() -> bool,
    {
        let polled = poll(timeout, poll_interval, || Ok(predicate().then_some(())));
        match polled {
            Ok(Ok(((), elapsed))) => WaitResult::Satisfied { elapsed },
            Ok(Err(elapsed)) => WaitResult::TimedOut { elapsed },
            // the attempt closure never fails
            Err(_) => WaitResult::TimedOut {
                elapsed: Duration::ZERO,
            },
        }
    }

    /// Poll with this waiter's default options
    pub fn wait<F>(&self, predicate: F) -> WaitResult
    where
        F: FnMut() -> bool,
    {
        self.wait_for(predicate, self.options.timeout(), self.options.poll_interval())
    }

    /// Wait for a described condition, failing hard on timeout
    ///
    /// # Errors
    ///
    /// `Timeout` naming the condition
    pub fn wait_for_condition<C: WaitCondition>(
        &self,
        condition: &C,
        options: &WaitOptions,
    ) -> HarnessResult<Duration> {
        let result = self.wait_for(
            || condition.check(),
            options.timeout(),
            options.poll_interval(),
        );
        tracing::trace!(
            condition = %condition.description(),
            satisfied = result.is_satisfied(),
            elapsed_ms = result.elapsed().as_millis() as u64,
            "wait finished"
        );
        result.into_result(condition.description())
    }
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Wait for a condition with default polling
///
/// # Errors
///
/// `Timeout` if the predicate never held
pub fn wait_until<F>(predicate: F, timeout_ms: u64) -> HarnessResult<()>
where
    F: FnMut() -> bool,
{
    let waiter = Waiter::new();
    waiter
        .wait_for(
            predicate,
            Duration::from_millis(timeout_ms),
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        )
        .into_result("custom predicate")?;
    Ok(())
}
