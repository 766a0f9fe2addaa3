//! Declarative object queries.
//!
//! An [`ObjectQuery`] is an ordered bag of property constraints, optionally
//! scoped to a container query. Queries are written in object notation:
//!
//! ```text
//! {type='QToolButton' toolTip='Show warning messages.' visible='1'}
//! {text?='info*' container={type='ConsoleView'}}
//! {text~='^#.*' occurrence='2'}
//! ```
//!
//! `=` matches exactly, `?=` matches a `*`/`?` wildcard pattern and `~=`
//! matches a regular expression.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::result::{HarnessError, HarnessResult};

/// Property key for the widget type
pub const TYPE_KEY: &str = "type";
/// Property key for the displayed text
pub const TEXT_KEY: &str = "text";
/// Property key for visibility (`1` or `0`)
pub const VISIBLE_KEY: &str = "visible";
/// Property key for the object name
pub const NAME_KEY: &str = "name";
/// Property key for tool tips
pub const TOOL_TIP_KEY: &str = "toolTip";

/// How a single property value is matched
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Exact string equality
    Exact(String),
    /// Glob pattern with `*` and `?`
    Wildcard {
        /// Pattern as written
        pattern: String,
        /// Compiled form
        regex: Regex,
    },
    /// Regular expression (unanchored)
    Regex(Regex),
}

impl Matcher {
    /// Exact matcher
    #[must_use]
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    /// Wildcard matcher
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` if the translated pattern does not compile
    pub fn wildcard(pattern: impl Into<String>) -> HarnessResult<Self> {
        let pattern = pattern.into();
        let mut translated = String::with_capacity(pattern.len() + 2);
        translated.push('^');
        for c in pattern.chars() {
            match c {
                '*' => translated.push_str(".*"),
                '?' => translated.push('.'),
                other => translated.push_str(&regex::escape(&other.to_string())),
            }
        }
        translated.push('$');
        let regex = Regex::new(&translated)
            .map_err(|e| HarnessError::invalid_query(format!("bad wildcard {pattern:?}: {e}")))?;
        Ok(Self::Wildcard { pattern, regex })
    }

    /// Regular expression matcher
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` if the expression does not compile
    pub fn regex(pattern: &str) -> HarnessResult<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| HarnessError::invalid_query(format!("bad regex {pattern:?}: {e}")))
    }

    /// Test a property value
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == value,
            Self::Wildcard { regex, .. } | Self::Regex(regex) => regex.is_match(value),
        }
    }

    fn operator(&self) -> &'static str {
        match self {
            Self::Exact(_) => "=",
            Self::Wildcard { .. } => "?=",
            Self::Regex(_) => "~=",
        }
    }

    fn source(&self) -> &str {
        match self {
            Self::Exact(value) => value,
            Self::Wildcard { pattern, .. } => pattern,
            Self::Regex(regex) => regex.as_str(),
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.operator() == other.operator() && self.source() == other.source()
    }
}

impl Eq for Matcher {}

/// Declarative constraint set selecting one element of the UI tree.
///
/// Builder methods consume `self`; a query never changes once built.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectQuery {
    properties: Vec<(String, Matcher)>,
    container: Option<Box<ObjectQuery>>,
    occurrence: Option<usize>,
}

impl ObjectQuery {
    /// Create an empty query
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Query for a widget type
    #[must_use]
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self::new().with_property(TYPE_KEY, type_name)
    }

    /// Query for displayed text
    #[must_use]
    pub fn with_text_only(text: impl Into<String>) -> Self {
        Self::new().with_property(TEXT_KEY, text)
    }

    /// Add an exact property constraint
    #[must_use]
    pub fn with_property(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_matcher(key, Matcher::exact(value))
    }

    /// Add a constraint with an explicit matcher
    #[must_use]
    pub fn with_matcher(mut self, key: impl Into<String>, matcher: Matcher) -> Self {
        let key = key.into();
        self.properties.retain(|(k, _)| *k != key);
        self.properties.push((key, matcher));
        self
    }

    /// Add a wildcard constraint
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for patterns that fail to compile
    pub fn with_wildcard(self, key: impl Into<String>, pattern: &str) -> HarnessResult<Self> {
        Ok(self.with_matcher(key, Matcher::wildcard(pattern)?))
    }

    /// Add a regular expression constraint
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for expressions that fail to compile
    pub fn with_regex(self, key: impl Into<String>, pattern: &str) -> HarnessResult<Self> {
        Ok(self.with_matcher(key, Matcher::regex(pattern)?))
    }

    /// Constrain the widget type
    #[must_use]
    pub fn with_type(self, type_name: impl Into<String>) -> Self {
        self.with_property(TYPE_KEY, type_name)
    }

    /// Constrain the displayed text
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_property(TEXT_KEY, text)
    }

    /// Constrain the object name
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_property(NAME_KEY, name)
    }

    /// Constrain the tool tip
    #[must_use]
    pub fn with_tool_tip(self, tool_tip: impl Into<String>) -> Self {
        self.with_property(TOOL_TIP_KEY, tool_tip)
    }

    /// Constrain visibility
    #[must_use]
    pub fn visible(self, visible: bool) -> Self {
        self.with_property(VISIBLE_KEY, if visible { "1" } else { "0" })
    }

    /// Scope the query to descendants of a container
    #[must_use]
    pub fn inside(mut self, container: Self) -> Self {
        self.container = Some(Box::new(container));
        self
    }

    /// Pick the n-th match (1-based) instead of requiring a unique one
    #[must_use]
    pub const fn occurrence(mut self, n: usize) -> Self {
        self.occurrence = Some(n);
        self
    }

    /// Property constraints in declaration order
    #[must_use]
    pub fn properties(&self) -> &[(String, Matcher)] {
        &self.properties
    }

    /// Matcher for a key, if constrained
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Matcher> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, m)| m)
    }

    /// Container query, if scoped
    #[must_use]
    pub fn container(&self) -> Option<&Self> {
        self.container.as_deref()
    }

    /// Selected occurrence, if any
    #[must_use]
    pub const fn selected_occurrence(&self) -> Option<usize> {
        self.occurrence
    }

    /// Check that the query (and its container chain) can select an element.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` when a query has neither a `type` nor a `text`
    /// constraint, or when `occurrence` is zero.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.get(TYPE_KEY).is_none() && self.get(TEXT_KEY).is_none() {
            return Err(HarnessError::invalid_query(format!(
                "{self} needs a type or text constraint"
            )));
        }
        if self.occurrence == Some(0) {
            return Err(HarnessError::invalid_query(format!(
                "{self}: occurrence is 1-based"
            )));
        }
        match &self.container {
            Some(container) => container.validate(),
            None => Ok(()),
        }
    }

    /// Whether an element's properties satisfy every constraint.
    ///
    /// Container scoping is not considered here.
    #[must_use]
    pub fn matches_properties(&self, properties: &BTreeMap<String, String>) -> bool {
        self.properties.iter().all(|(key, matcher)| {
            properties
                .get(key)
                .is_some_and(|value| matcher.matches(value))
        })
    }
}

impl fmt::Display for ObjectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| {
            if first {
                first = false;
                Ok(())
            } else {
                f.write_str(" ")
            }
        };
        for (key, matcher) in &self.properties {
            sep(f)?;
            write!(f, "{key}{}'{}'", matcher.operator(), escape(matcher.source()))?;
        }
        if let Some(n) = self.occurrence {
            sep(f)?;
            write!(f, "occurrence='{n}'")?;
        }
        if let Some(container) = &self.container {
            sep(f)?;
            write!(f, "container={container}")?;
        }
        f.write_str("}")
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl FromStr for ObjectQuery {
    type Err = HarnessError;

    fn from_str(s: &str) -> HarnessResult<Self> {
        let mut parser = NotationParser {
            chars: s.chars().collect(),
            pos: 0,
        };
        let query = parser.query()?;
        parser.skip_ws();
        if parser.pos < parser.chars.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(query)
    }
}

impl TryFrom<String> for ObjectQuery {
    type Error = HarnessError;

    fn try_from(value: String) -> HarnessResult<Self> {
        value.parse()
    }
}

impl From<ObjectQuery> for String {
    fn from(query: ObjectQuery) -> Self {
        query.to_string()
    }
}

struct NotationParser {
    chars: Vec<char>,
    pos: usize,
}

impl NotationParser {
    fn error(&self, what: &str) -> HarnessError {
        HarnessError::invalid_query(format!("{what} at offset {}", self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> HarnessResult<()> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn query(&mut self) -> HarnessResult<ObjectQuery> {
        self.expect('{')?;
        let mut query = ObjectQuery::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(query);
                }
                None => return Err(self.error("unterminated query")),
                Some(_) => {}
            }
            let key = self.ident()?;
            let op = self.operator()?;
            self.skip_ws();
            if key == "container" {
                if op != "=" {
                    return Err(self.error("container only supports '='"));
                }
                let container = self.query()?;
                query = query.inside(container);
                continue;
            }
            let value = self.quoted()?;
            let is_occurrence = key == "occurrence";
            query = match op {
                "=" if is_occurrence => {
                    let n = value
                        .parse::<usize>()
                        .map_err(|_| self.error("occurrence must be a number"))?;
                    query.occurrence(n)
                }
                "=" => query.with_property(key, value),
                "?=" => query.with_wildcard(key, &value)?,
                _ => query.with_regex(key, &value)?,
            };
        }
    }

    fn ident(&mut self) -> HarnessResult<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected property name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn operator(&mut self) -> HarnessResult<&'static str> {
        self.skip_ws();
        let op = match (self.peek(), self.chars.get(self.pos + 1).copied()) {
            (Some('='), _) => "=",
            (Some('?'), Some('=')) => "?=",
            (Some('~'), Some('=')) => "~=",
            _ => return Err(self.error("expected '=', '?=' or '~='")),
        };
        self.pos += op.len();
        Ok(op)
    }

    fn quoted(&mut self) -> HarnessResult<String> {
        if self.peek() != Some('\'') {
            return Err(self.error("expected quoted value"));
        }
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated value")),
                Some('\'') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    value.push(escaped);
                    self.pos += 1;
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    mod matcher_tests {
        use super::*;

        #[test]
        fn test_exact() {
            let m = Matcher::exact("66");
            assert!(m.matches("66"));
            assert!(!m.matches("666"));
        }

        #[test]
        fn test_wildcard_is_anchored() {
            let m = Matcher::wildcard("info*").unwrap();
            assert!(m.matches("info message2"));
            assert!(!m.matches("an info message"));
            let m = Matcher::wildcard("w?dth").unwrap();
            assert!(m.matches("width"));
        }

        #[test]
        fn test_wildcard_escapes_metacharacters() {
            let m = Matcher::wildcard("0.1875").unwrap();
            assert!(m.matches("0.1875"));
            assert!(!m.matches("0x1875"));
        }

        #[test]
        fn test_bad_regex() {
            assert!(matches!(
                Matcher::regex("("),
                Err(HarnessError::InvalidQuery { .. })
            ));
        }

        #[test]
        fn test_equality_by_source() {
            assert_eq!(Matcher::regex("^a").unwrap(), Matcher::regex("^a").unwrap());
            assert_ne!(Matcher::exact("a"), Matcher::wildcard("a").unwrap());
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_builder_keeps_order_and_replaces_duplicates() {
            let q = ObjectQuery::of_type("QToolButton")
                .visible(true)
                .with_text("a")
                .with_text("b");
            let keys: Vec<_> = q.properties().iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["type", "visible", "text"]);
            assert_eq!(q.get("text"), Some(&Matcher::exact("b")));
        }

        #[test]
        fn test_matches_properties() {
            let q = ObjectQuery::of_type("Row").with_text("66");
            assert!(q.matches_properties(&props(&[("type", "Row"), ("text", "66")])));
            assert!(!q.matches_properties(&props(&[("type", "Row"), ("text", "6")])));
            assert!(!q.matches_properties(&props(&[("type", "Row")])));
        }

        #[test]
        fn test_validate_requires_type_or_text() {
            assert!(ObjectQuery::new().with_name("x").validate().is_err());
            assert!(ObjectQuery::with_text_only("x").validate().is_ok());
            let bad_container = ObjectQuery::of_type("Row").inside(ObjectQuery::new());
            assert!(bad_container.validate().is_err());
            assert!(ObjectQuery::of_type("Row").occurrence(0).validate().is_err());
        }
    }

    mod notation_tests {
        use super::*;

        #[test]
        fn test_parse_flat() {
            let q: ObjectQuery = "{type='QToolButton' toolTip='Show warning messages.' unnamed='1'}"
                .parse()
                .unwrap();
            assert_eq!(q.get("type"), Some(&Matcher::exact("QToolButton")));
            assert_eq!(
                q.get("toolTip"),
                Some(&Matcher::exact("Show warning messages."))
            );
            assert!(q.container().is_none());
        }

        #[test]
        fn test_parse_container_and_occurrence() {
            let q: ObjectQuery = "{text='Rectangle' occurrence='2' container={type='WatchTreeView'}}"
                .parse()
                .unwrap();
            assert_eq!(q.selected_occurrence(), Some(2));
            assert_eq!(
                q.container().unwrap().get("type"),
                Some(&Matcher::exact("WatchTreeView"))
            );
        }

        #[test]
        fn test_parse_operators_and_escapes() {
            let q: ObjectQuery = r"{text?='info*' name~='^con' tip='it\'s'}".parse().unwrap();
            assert!(matches!(q.get("text"), Some(Matcher::Wildcard { .. })));
            assert!(matches!(q.get("name"), Some(Matcher::Regex(_))));
            assert_eq!(q.get("tip"), Some(&Matcher::exact("it's")));
        }

        #[test]
        fn test_parse_errors() {
            for bad in [
                "type='x'",
                "{type='x'",
                "{type=x}",
                "{='x'}",
                "{type='x'} extra",
                "{occurrence='two' type='x'}",
            ] {
                assert!(bad.parse::<ObjectQuery>().is_err(), "{bad} should fail");
            }
        }

        #[test]
        fn test_display() {
            let q = ObjectQuery::of_type("Row")
                .with_text("it's")
                .occurrence(2)
                .inside(ObjectQuery::of_type("View"));
            assert_eq!(
                q.to_string(),
                r"{type='Row' text='it\'s' occurrence='2' container={type='View'}}"
            );
        }

        #[test]
        fn test_serde_as_string() {
            let q = ObjectQuery::of_type("Row").with_text("66");
            let json = serde_json::to_string(&q).unwrap();
            assert_eq!(json, r#""{type='Row' text='66'}""#);
            let back: ObjectQuery = serde_json::from_str(&json).unwrap();
            assert_eq!(back, q);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn notation_survives_printing(
                type_name in "[A-Za-z][A-Za-z0-9_]{0,12}",
                text in "[ -~\u{200b}]{0,16}",
                occurrence in proptest::option::of(1usize..5),
            ) {
                let mut q = ObjectQuery::of_type(type_name).with_text(text);
                if let Some(n) = occurrence {
                    q = q.occurrence(n);
                }
                let parsed: ObjectQuery = q.to_string().parse().unwrap();
                prop_assert_eq!(parsed, q);
            }

            #[test]
            fn exact_wildcard_matches_itself(value in "[a-z0-9 .#]{0,20}") {
                let m = Matcher::wildcard(&value).unwrap();
                prop_assert!(m.matches(&value));
            }
        }
    }
}
