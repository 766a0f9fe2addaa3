//! Actuator: primitive input actions against resolved elements.
//!
//! The effect of an action is never returned; it is observed afterwards
//! through the [`Locator`](crate::Locator) and [`Waiter`](crate::Waiter).

use crate::driver::{ensure_current, Driver, ElementHandle};
use crate::result::{HarnessError, HarnessResult};

/// Property read by [`Actuator::ensure_checked`]
pub const CHECKED_KEY: &str = "checked";

/// Key used to submit console input
pub const RETURN_KEY: &str = "<Return>";

/// Input helpers
#[derive(Debug, Clone, Copy)]
pub struct Actuator;

impl Actuator {
    /// Click an element
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `DispatchFailed`
    pub fn click<D: Driver + ?Sized>(driver: &mut D, handle: ElementHandle) -> HarnessResult<()> {
        ensure_current(driver, handle)?;
        tracing::debug!(%handle, "click");
        driver.click(handle)
    }

    /// Type text into an element
    ///
    /// # Errors
    ///
    /// `InvalidInput` for empty text, `StaleHandle` or `DispatchFailed`
    pub fn type_text<D: Driver + ?Sized>(
        driver: &mut D,
        handle: ElementHandle,
        text: &str,
    ) -> HarnessResult<()> {
        if text.is_empty() {
            return Err(HarnessError::invalid_input("text must not be empty"));
        }
        ensure_current(driver, handle)?;
        tracing::debug!(%handle, text, "type text");
        driver.type_text(handle, text)
    }

    /// Press a named key
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty key name, `StaleHandle` or `DispatchFailed`
    pub fn type_key<D: Driver + ?Sized>(
        driver: &mut D,
        handle: ElementHandle,
        key: &str,
    ) -> HarnessResult<()> {
        let key = normalize_key(key)?;
        ensure_current(driver, handle)?;
        tracing::debug!(%handle, key = %key, "type key");
        driver.type_key(handle, &key)
    }

    /// Bring a checkable control into the wanted state.
    ///
    /// Returns whether a click was needed.
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `DispatchFailed`
    pub fn ensure_checked<D: Driver + ?Sized>(
        driver: &mut D,
        handle: ElementHandle,
        checked: bool,
    ) -> HarnessResult<bool> {
        ensure_current(driver, handle)?;
        let current = matches!(
            driver.property(handle, CHECKED_KEY)?.as_deref(),
            Some("1" | "true")
        );
        if current == checked {
            return Ok(false);
        }
        tracing::debug!(%handle, checked, "toggle");
        driver.click(handle)?;
        Ok(true)
    }
}

/// Wrap a bare key name in angle brackets: `Return` becomes `<Return>`
///
/// # Errors
///
/// `InvalidInput` for empty names
pub fn normalize_key(key: &str) -> HarnessResult<String> {
    let trimmed = key.trim();
    let bare = trimmed
        .strip_prefix('<')
        .and_then(|k| k.strip_suffix('>'))
        .unwrap_or(trimmed);
    if bare.is_empty() {
        return Err(HarnessError::invalid_input("key name must not be empty"));
    }
    Ok(format!("<{bare}>"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;

    mod key_tests {
        use super::*;

        #[test]
        fn test_normalize_key() {
            assert_eq!(normalize_key("Return").unwrap(), "<Return>");
            assert_eq!(normalize_key("<Return>").unwrap(), "<Return>");
            assert_eq!(normalize_key(" Escape ").unwrap(), "<Escape>");
            assert!(normalize_key("").is_err());
            assert!(normalize_key("<>").is_err());
        }
    }

    mod dispatch_tests {
        use super::*;

        #[test]
        fn test_dispatch_is_recorded() {
            let mut driver = MockDriver::new();
            let edit = driver.add_root(&[("type", "ConsoleEdit")]);
            Actuator::click(&mut driver, edit).unwrap();
            Actuator::type_text(&mut driver, edit, "width").unwrap();
            Actuator::type_key(&mut driver, edit, "Return").unwrap();
            assert_eq!(
                driver.history(),
                &[
                    format!("click:{edit}"),
                    format!("type:{edit}:width"),
                    format!("key:{edit}:<Return>"),
                ]
            );
        }

        #[test]
        fn test_empty_text_rejected_before_dispatch() {
            let mut driver = MockDriver::new();
            let edit = driver.add_root(&[("type", "ConsoleEdit")]);
            let err = Actuator::type_text(&mut driver, edit, "").unwrap_err();
            assert!(matches!(err, HarnessError::InvalidInput { .. }));
            assert!(driver.history().is_empty());
        }

        #[test]
        fn test_stale_after_removal() {
            let mut driver = MockDriver::new();
            let button = driver.add_root(&[("type", "QToolButton")]);
            driver.remove(button);
            let err = Actuator::click(&mut driver, button).unwrap_err();
            assert!(matches!(err, HarnessError::StaleHandle { .. }));
        }

        #[test]
        fn test_stale_after_new_session() {
            let mut driver = MockDriver::new();
            let button = driver.add_root(&[("type", "QToolButton")]);
            driver.restart_session();
            let err = Actuator::click(&mut driver, button).unwrap_err();
            assert!(matches!(err, HarnessError::StaleHandle { .. }));
        }

        #[test]
        fn test_dispatch_failure_surfaces() {
            let mut driver = MockDriver::new();
            let button = driver.add_root(&[("type", "QToolButton")]);
            driver.reject_dispatch(true);
            let err = Actuator::click(&mut driver, button).unwrap_err();
            assert!(matches!(err, HarnessError::DispatchFailed { .. }));
        }

        #[test]
        fn test_ensure_checked() {
            let mut driver = MockDriver::new();
            let toggle =
                driver.add_root(&[("type", "QToolButton"), ("checkable", "1"), ("checked", "1")]);
            assert!(!Actuator::ensure_checked(&mut driver, toggle, true).unwrap());
            assert!(Actuator::ensure_checked(&mut driver, toggle, false).unwrap());
            assert_eq!(
                driver.property(toggle, CHECKED_KEY).unwrap().as_deref(),
                Some("0")
            );
            assert!(!Actuator::ensure_checked(&mut driver, toggle, false).unwrap());
        }
    }
}
