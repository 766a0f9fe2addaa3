//! Locator: resolve an [`ObjectQuery`] against the live element tree.
//!
//! # Design Philosophy
//!
//! - **Auto-Waiting**: resolution polls the driver until the element exists
//! - **Strict Selection**: more than one match is an error, never "pick first"
//! - **Container Scoping**: containers are resolved in the same snapshot
//!   as the element, so the pair is always consistent

use std::time::Duration;

use crate::driver::{Ancestry, Driver, ElementHandle, ElementNode};
use crate::query::ObjectQuery;
use crate::result::{HarnessError, HarnessResult};
use crate::wait::{poll, DEFAULT_POLL_INTERVAL_MS};

/// Default timeout for auto-waiting (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Locator options for customizing behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorOptions {
    /// Timeout for auto-waiting
    pub timeout: Duration,
    /// Polling interval for auto-waiting
    pub poll_interval: Duration,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Result of scanning one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scan {
    None,
    Unique(ElementHandle),
    Many(Vec<ElementHandle>),
}

/// Resolves queries to element handles
#[derive(Debug, Clone, Copy, Default)]
pub struct Locator {
    options: LocatorOptions,
}

impl Locator {
    /// Create a locator with default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a locator with custom options
    #[must_use]
    pub const fn with_options(options: LocatorOptions) -> Self {
        Self { options }
    }

    /// Set the default timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.options.poll_interval = poll_interval;
        self
    }

    /// Get the options
    #[must_use]
    pub const fn options(&self) -> &LocatorOptions {
        &self.options
    }

    /// Resolve with the default timeout
    ///
    /// # Errors
    ///
    /// See [`Locator::resolve`]
    pub fn locate<D: Driver + ?Sized>(
        &self,
        driver: &D,
        query: &ObjectQuery,
    ) -> HarnessResult<ElementHandle> {
        self.resolve(driver, query, self.options.timeout)
    }

    /// Resolve `query` to exactly one element, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// - `InvalidQuery` if the query (or a container) lacks a type/text constraint
    /// - `NotFound` if nothing matched before the timeout
    /// - `Ambiguous` as soon as more than one element matches
    pub fn resolve<D: Driver + ?Sized>(
        &self,
        driver: &D,
        query: &ObjectQuery,
        timeout: Duration,
    ) -> HarnessResult<ElementHandle> {
        query.validate()?;
        let polled = poll(timeout, self.options.poll_interval, || {
            let nodes = driver.snapshot()?;
            match scan(&nodes, &Ancestry::new(&nodes), query)? {
                Scan::None => Ok(None),
                Scan::Unique(handle) => Ok(Some(handle)),
                Scan::Many(found) => Err(HarnessError::Ambiguous {
                    query: query.to_string(),
                    count: found.len(),
                }),
            }
        })?;
        match polled {
            Ok((handle, elapsed)) => {
                tracing::debug!(%query, %handle, elapsed_ms = elapsed.as_millis() as u64, "resolved");
                Ok(handle)
            }
            Err(_) => Err(HarnessError::NotFound {
                query: query.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Wait for at least one match and return the first in tree order.
    ///
    /// Used where duplicates are expected and harmless, e.g. an output line
    /// whose text also appears in the echoed input.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` or `NotFound`
    pub fn resolve_first<D: Driver + ?Sized>(
        &self,
        driver: &D,
        query: &ObjectQuery,
        timeout: Duration,
    ) -> HarnessResult<ElementHandle> {
        query.validate()?;
        let polled = poll(timeout, self.options.poll_interval, || {
            let nodes = driver.snapshot()?;
            Ok(match scan(&nodes, &Ancestry::new(&nodes), query)? {
                Scan::None => None,
                Scan::Unique(handle) => Some(handle),
                Scan::Many(found) => found.first().copied(),
            })
        })?;
        polled.map(|(handle, _)| handle).map_err(|_| HarnessError::NotFound {
            query: query.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// All current matches, without waiting
    ///
    /// # Errors
    ///
    /// `InvalidQuery`, or `Ambiguous` if a container matches more than once
    pub fn find_all<D: Driver + ?Sized>(
        &self,
        driver: &D,
        query: &ObjectQuery,
    ) -> HarnessResult<Vec<ElementHandle>> {
        query.validate()?;
        let nodes = driver.snapshot()?;
        Ok(match scan(&nodes, &Ancestry::new(&nodes), query)? {
            Scan::None => Vec::new(),
            Scan::Unique(handle) => vec![handle],
            Scan::Many(found) => found,
        })
    }

    /// Whether at least one element currently matches
    ///
    /// # Errors
    ///
    /// See [`Locator::find_all`]
    pub fn exists<D: Driver + ?Sized>(&self, driver: &D, query: &ObjectQuery) -> HarnessResult<bool> {
        Ok(!self.find_all(driver, query)?.is_empty())
    }
}

fn scan(nodes: &[ElementNode], ancestry: &Ancestry, query: &ObjectQuery) -> HarnessResult<Scan> {
    let scope = match query.container() {
        None => None,
        Some(container) => match scan(nodes, ancestry, container)? {
            Scan::None => return Ok(Scan::None),
            Scan::Unique(handle) => Some(handle),
            Scan::Many(found) => {
                return Err(HarnessError::Ambiguous {
                    query: container.to_string(),
                    count: found.len(),
                })
            }
        },
    };

    let matches: Vec<ElementHandle> = nodes
        .iter()
        .filter(|node| query.matches_properties(&node.properties))
        .filter(|node| scope.map_or(true, |c| ancestry.is_descendant(node.handle, c)))
        .map(|node| node.handle)
        .collect();

    if let Some(n) = query.selected_occurrence() {
        return Ok(matches
            .get(n.saturating_sub(1))
            .copied()
            .map_or(Scan::None, Scan::Unique));
    }

    Ok(match matches.len() {
        0 => Scan::None,
        1 => Scan::Unique(matches[0]),
        _ => Scan::Many(matches),
    })
}
