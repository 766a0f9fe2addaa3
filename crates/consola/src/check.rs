//! Check: one input/expected-output unit

use serde::{Deserialize, Serialize};

/// One console input and the output it should produce.
///
/// `expected == None` means "capture, do not assert". A follow-up without an
/// expected value of its own inherits the parent's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Text typed into the console
    pub input: String,
    /// Expected output line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Check run right after this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<Box<Check>>,
}

impl Check {
    /// Asserting check
    #[must_use]
    pub fn new(input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected: Some(expected.into()),
            follow_up: None,
        }
    }

    /// Capturing check
    #[must_use]
    pub fn capture(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected: None,
            follow_up: None,
        }
    }

    /// Attach a follow-up check
    #[must_use]
    pub fn then(mut self, follow_up: Self) -> Self {
        self.follow_up = Some(Box::new(follow_up));
        self
    }

    /// Attach a follow-up that expects the same output
    #[must_use]
    pub fn then_input(self, input: impl Into<String>) -> Self {
        self.then(Self::capture(input))
    }

    /// Whether the check only captures output
    #[must_use]
    pub const fn is_capture(&self) -> bool {
        self.expected.is_none()
    }

    /// Follow-up with the inherited expected value filled in
    #[must_use]
    pub fn resolved_follow_up(&self) -> Option<Self> {
        self.follow_up.as_deref().map(|f| Self {
            expected: f.expected.clone().or_else(|| self.expected.clone()),
            ..f.clone()
        })
    }

    /// Short label used in outcome descriptions
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.expected {
            Some(expected) => format!("{} => {}", self.input, expected),
            None => format!("{} (capture)", self.input),
        }
    }
}
