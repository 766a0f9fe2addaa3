//! Driver - the UI driving boundary
//!
//! The harness never talks to widgets directly. Everything goes through a
//! [`Driver`]: a snapshot of the live element tree for lookups, and input
//! dispatch for actions.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Driver (trait)                                               │
//! │                                                               │
//! │   snapshot() ──► Vec<ElementNode>   (Locator, Waiter)         │
//! │   click / type_text / type_key      (Actuator)                │
//! │   text / property / children        (Console, Runner)         │
//! │                                                               │
//! │   MockDriver  - in-memory widget tree (tests, demos)          │
//! │   <your own>  - adapter to a real UI automation backend       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::query::{TEXT_KEY, TYPE_KEY, VISIBLE_KEY};
use crate::result::{HarnessError, HarnessResult};

/// Opaque, non-owning reference to a live UI element.
///
/// A handle is only meaningful for the driver session it was resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle {
    id: u64,
    session: u64,
}

impl ElementHandle {
    /// Create a handle. Only drivers should need this.
    #[must_use]
    pub const fn new(id: u64, session: u64) -> Self {
        Self { id, session }
    }

    /// Driver-specific element id
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Session the handle belongs to
    #[must_use]
    pub const fn session(&self) -> u64 {
        self.session
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.id, self.session)
    }
}

/// Snapshot of one live element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementNode {
    /// Handle of this element
    pub handle: ElementHandle,
    /// Parent element, `None` for top-level windows
    pub parent: Option<ElementHandle>,
    /// Property values as displayed by the driver
    pub properties: BTreeMap<String, String>,
    /// Ordered children
    pub children: Vec<ElementHandle>,
}

impl ElementNode {
    /// Property value by key
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Displayed text (empty when the element has none)
    #[must_use]
    pub fn text(&self) -> &str {
        self.property(TEXT_KEY).unwrap_or_default()
    }

    /// Widget type
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.property(TYPE_KEY)
    }

    /// Visible unless the driver says otherwise
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self.property(VISIBLE_KEY), Some("0" | "false"))
    }
}

/// Parent lookup over one snapshot
#[derive(Debug, Default)]
pub struct Ancestry {
    parents: HashMap<ElementHandle, Option<ElementHandle>>,
}

impl Ancestry {
    /// Index a snapshot
    #[must_use]
    pub fn new(nodes: &[ElementNode]) -> Self {
        Self {
            parents: nodes.iter().map(|n| (n.handle, n.parent)).collect(),
        }
    }

    /// Whether `handle` sits somewhere below `ancestor`
    #[must_use]
    pub fn is_descendant(&self, handle: ElementHandle, ancestor: ElementHandle) -> bool {
        let mut current = handle;
        // bounded so a malformed tree cannot loop forever
        for _ in 0..=self.parents.len() {
            match self.parents.get(&current).copied().flatten() {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }
}

/// UI driving boundary.
///
/// Implementations adapt a concrete automation backend. Read operations take
/// `&self`; input dispatch takes `&mut self`.
pub trait Driver {
    /// Current session id; handles from other sessions are stale
    fn session(&self) -> u64;

    /// Snapshot of all live elements, parents before children
    ///
    /// # Errors
    ///
    /// Backend failures
    fn snapshot(&self) -> HarnessResult<Vec<ElementNode>>;

    /// Snapshot of a single element
    ///
    /// # Errors
    ///
    /// `StaleHandle` if the element no longer exists
    fn node(&self, handle: ElementHandle) -> HarnessResult<ElementNode>;

    /// Dispatch a click
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `DispatchFailed`
    fn click(&mut self, handle: ElementHandle) -> HarnessResult<()>;

    /// Dispatch typed text
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `DispatchFailed`
    fn type_text(&mut self, handle: ElementHandle, text: &str) -> HarnessResult<()>;

    /// Dispatch a named key such as `<Return>`
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `DispatchFailed`
    fn type_key(&mut self, handle: ElementHandle, key: &str) -> HarnessResult<()>;

    /// Displayed text of an element
    ///
    /// # Errors
    ///
    /// `StaleHandle` if the element no longer exists
    fn text(&self, handle: ElementHandle) -> HarnessResult<String> {
        Ok(self.node(handle)?.text().to_string())
    }

    /// Property of an element
    ///
    /// # Errors
    ///
    /// `StaleHandle` if the element no longer exists
    fn property(&self, handle: ElementHandle, key: &str) -> HarnessResult<Option<String>> {
        Ok(self.node(handle)?.property(key).map(str::to_string))
    }

    /// Ordered children of a container
    ///
    /// # Errors
    ///
    /// `StaleHandle` if the element no longer exists
    fn children(&self, handle: ElementHandle) -> HarnessResult<Vec<ElementHandle>> {
        Ok(self.node(handle)?.children)
    }

    /// Texts of a container's children, in order
    ///
    /// # Errors
    ///
    /// `StaleHandle` if the container or a child vanished mid-read
    fn child_texts(&self, handle: ElementHandle) -> HarnessResult<Vec<String>> {
        self.children(handle)?
            .into_iter()
            .map(|child| self.text(child))
            .collect()
    }
}

/// Reject handles that belong to an older session
///
/// # Errors
///
/// `StaleHandle` when the sessions differ
pub fn ensure_current<D: Driver + ?Sized>(driver: &D, handle: ElementHandle) -> HarnessResult<()> {
    if handle.session() == driver.session() {
        Ok(())
    } else {
        Err(HarnessError::StaleHandle {
            handle: handle.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn node(id: u64, parent: Option<u64>, props: &[(&str, &str)]) -> ElementNode {
        ElementNode {
            handle: ElementHandle::new(id, 1),
            parent: parent.map(|p| ElementHandle::new(p, 1)),
            properties: props
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            children: Vec::new(),
        }
    }

    mod element_node_tests {
        use super::*;

        #[test]
        fn test_text_defaults_to_empty() {
            let n = node(1, None, &[("type", "Row")]);
            assert_eq!(n.text(), "");
            assert_eq!(n.type_name(), Some("Row"));
        }

        #[test]
        fn test_visibility() {
            assert!(node(1, None, &[]).is_visible());
            assert!(node(1, None, &[("visible", "1")]).is_visible());
            assert!(!node(1, None, &[("visible", "0")]).is_visible());
            assert!(!node(1, None, &[("visible", "false")]).is_visible());
        }

        #[test]
        fn test_handle_display() {
            assert_eq!(ElementHandle::new(7, 2).to_string(), "#7@2");
        }
    }

    mod ancestry_tests {
        use super::*;

        #[test]
        fn test_descendants() {
            let nodes = vec![
                node(1, None, &[]),
                node(2, Some(1), &[]),
                node(3, Some(2), &[]),
                node(4, None, &[]),
            ];
            let ancestry = Ancestry::new(&nodes);
            let h = |id| ElementHandle::new(id, 1);
            assert!(ancestry.is_descendant(h(3), h(1)));
            assert!(ancestry.is_descendant(h(2), h(1)));
            assert!(!ancestry.is_descendant(h(1), h(1)));
            assert!(!ancestry.is_descendant(h(3), h(4)));
        }

        #[test]
        fn test_cycle_terminates() {
            let nodes = vec![node(1, Some(2), &[]), node(2, Some(1), &[])];
            let ancestry = Ancestry::new(&nodes);
            assert!(!ancestry.is_descendant(
                ElementHandle::new(1, 1),
                ElementHandle::new(9, 1)
            ));
        }
    }
}
