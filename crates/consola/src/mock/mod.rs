//! Mock Driver Module
//!
//! An in-memory widget tree implementing [`Driver`], for testing harness code
//! without a real application. Input events are recorded and handed to an
//! optional [`Behavior`] that plays the part of the application under test.
//!
//! ## Example
//!
//! ```rust
//! use consola::mock::MockDriver;
//! use consola::{Driver, Locator, ObjectQuery};
//! use std::time::Duration;
//!
//! let mut driver = MockDriver::new();
//! let window = driver.add_root(&[("type", "MainWindow")]);
//! driver.add_child(window, &[("type", "QToolButton"), ("text", "Clear")]);
//!
//! let clear = Locator::new()
//!     .resolve(&driver, &ObjectQuery::of_type("QToolButton"), Duration::ZERO)
//!     .unwrap();
//! assert_eq!(driver.text(clear).unwrap(), "Clear");
//! ```

pub mod console;

pub use console::{ConsoleApp, Severity, Value};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::actuator::CHECKED_KEY;
use crate::driver::{Driver, ElementHandle, ElementNode};
use crate::result::{HarnessError, HarnessResult};

/// Input event delivered to a [`Behavior`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Mouse click
    Click(ElementHandle),
    /// Typed text
    Text(ElementHandle, String),
    /// Named key such as `<Return>`
    Key(ElementHandle, String),
}

impl InputEvent {
    /// Element the event was sent to
    #[must_use]
    pub const fn target(&self) -> ElementHandle {
        match self {
            Self::Click(h) | Self::Text(h, _) | Self::Key(h, _) => *h,
        }
    }
}

/// Application logic reacting to input on a [`WidgetTree`]
pub trait Behavior {
    /// Handle one input event after it reached the tree
    ///
    /// # Errors
    ///
    /// `DispatchFailed` when the application refuses the input
    fn on_input(&mut self, tree: &mut WidgetTree, event: &InputEvent) -> HarnessResult<()>;
}

#[derive(Debug, Clone)]
struct MockNode {
    parent: Option<u64>,
    properties: BTreeMap<String, String>,
    children: Vec<u64>,
    appears_at: Option<Instant>,
}

impl MockNode {
    fn appeared(&self) -> bool {
        self.appears_at.map_or(true, |at| Instant::now() >= at)
    }
}

/// In-memory element tree
#[derive(Debug, Clone, Default)]
pub struct WidgetTree {
    session: u64,
    next_id: u64,
    nodes: BTreeMap<u64, MockNode>,
    roots: Vec<u64>,
}

fn to_properties(props: &[(&str, &str)]) -> BTreeMap<String, String> {
    props
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

impl WidgetTree {
    /// Create an empty tree in session 1
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: 1,
            ..Self::default()
        }
    }

    /// Current session
    #[must_use]
    pub const fn session(&self) -> u64 {
        self.session
    }

    /// End the session; every handle handed out so far becomes stale
    pub fn restart_session(&mut self) {
        self.session += 1;
    }

    fn handle(&self, id: u64) -> ElementHandle {
        ElementHandle::new(id, self.session)
    }

    fn insert(&mut self, parent: Option<u64>, props: &[(&str, &str)], delay: Option<Duration>) -> ElementHandle {
        self.next_id += 1;
        let id = self.next_id;
        let _ = self.nodes.insert(
            id,
            MockNode {
                parent,
                properties: to_properties(props),
                children: Vec::new(),
                appears_at: delay.map(|d| Instant::now() + d),
            },
        );
        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(parent_node) => parent_node.children.push(id),
            None => self.roots.push(id),
        }
        self.handle(id)
    }

    fn live(&self, handle: ElementHandle) -> Option<&MockNode> {
        if handle.session() != self.session {
            return None;
        }
        let node = self.nodes.get(&handle.id())?;
        // an element is live only if it and all its ancestors have appeared
        let mut current = Some(node);
        while let Some(n) = current {
            if !n.appeared() {
                return None;
            }
            current = n.parent.and_then(|p| self.nodes.get(&p));
        }
        Some(node)
    }

    /// Add a top-level element
    pub fn add_root(&mut self, props: &[(&str, &str)]) -> ElementHandle {
        self.insert(None, props, None)
    }

    /// Append a child element
    pub fn add_child(&mut self, parent: ElementHandle, props: &[(&str, &str)]) -> ElementHandle {
        self.insert(Some(parent.id()), props, None)
    }

    /// Append a child that only shows up after `delay`
    pub fn add_child_delayed(
        &mut self,
        parent: ElementHandle,
        props: &[(&str, &str)],
        delay: Duration,
    ) -> ElementHandle {
        self.insert(Some(parent.id()), props, Some(delay))
    }

    /// Destroy an element and its subtree
    pub fn remove(&mut self, handle: ElementHandle) {
        let Some(node) = self.nodes.remove(&handle.id()) else {
            return;
        };
        match node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(parent) => parent.children.retain(|c| *c != handle.id()),
            None => self.roots.retain(|r| *r != handle.id()),
        }
        let mut pending = node.children;
        while let Some(id) = pending.pop() {
            if let Some(child) = self.nodes.remove(&id) {
                pending.extend(child.children);
            }
        }
    }

    /// Destroy all children of an element
    pub fn clear_children(&mut self, handle: ElementHandle) {
        let children = self
            .nodes
            .get(&handle.id())
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for id in children {
            self.remove(self.handle(id));
        }
    }

    /// Set a property, creating it if needed
    pub fn set_property(&mut self, handle: ElementHandle, key: &str, value: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(&handle.id()) {
            let _ = node.properties.insert(key.to_string(), value.into());
        }
    }

    /// Property of a live element
    #[must_use]
    pub fn get_property(&self, handle: ElementHandle, key: &str) -> Option<&str> {
        self.live(handle)
            .and_then(|n| n.properties.get(key))
            .map(String::as_str)
    }

    fn to_node(&self, id: u64, node: &MockNode) -> ElementNode {
        ElementNode {
            handle: self.handle(id),
            parent: node.parent.map(|p| self.handle(p)),
            properties: node.properties.clone(),
            children: node
                .children
                .iter()
                .filter(|c| self.nodes.get(c).is_some_and(MockNode::appeared))
                .map(|c| self.handle(*c))
                .collect(),
        }
    }

    /// Snapshot of one live element
    #[must_use]
    pub fn node(&self, handle: ElementHandle) -> Option<ElementNode> {
        self.live(handle).map(|n| self.to_node(handle.id(), n))
    }

    /// Depth-first snapshot of all live elements
    #[must_use]
    pub fn snapshot(&self) -> Vec<ElementNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<u64> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.appeared() {
                continue;
            }
            out.push(self.to_node(id, node));
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// Mock driver for unit testing
#[derive(Default)]
pub struct MockDriver {
    tree: WidgetTree,
    behavior: Option<Box<dyn Behavior>>,
    history: Vec<String>,
    reject: bool,
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("tree", &self.tree)
            .field("has_behavior", &self.behavior.is_some())
            .field("history", &self.history.len())
            .finish()
    }
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: WidgetTree::new(),
            ..Self::default()
        }
    }

    /// Wrap an already populated tree
    #[must_use]
    pub fn from_tree(tree: WidgetTree) -> Self {
        Self {
            tree,
            ..Self::default()
        }
    }

    /// Install application behavior
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    /// Underlying tree
    #[must_use]
    pub const fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    /// Underlying tree, mutable
    pub fn tree_mut(&mut self) -> &mut WidgetTree {
        &mut self.tree
    }

    /// Add a top-level element
    pub fn add_root(&mut self, props: &[(&str, &str)]) -> ElementHandle {
        self.tree.add_root(props)
    }

    /// Append a child element
    pub fn add_child(&mut self, parent: ElementHandle, props: &[(&str, &str)]) -> ElementHandle {
        self.tree.add_child(parent, props)
    }

    /// Append a child that appears after `delay`
    pub fn add_child_delayed(
        &mut self,
        parent: ElementHandle,
        props: &[(&str, &str)],
        delay: Duration,
    ) -> ElementHandle {
        self.tree.add_child_delayed(parent, props, delay)
    }

    /// Destroy an element
    pub fn remove(&mut self, handle: ElementHandle) {
        self.tree.remove(handle);
    }

    /// Start a new session
    pub fn restart_session(&mut self) {
        self.tree.restart_session();
    }

    /// Make every dispatch fail with `DispatchFailed`
    pub fn reject_dispatch(&mut self, reject: bool) {
        self.reject = reject;
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Check if an action was dispatched
    #[must_use]
    pub fn was_called(&self, action: &str) -> bool {
        self.history.iter().any(|c| c.starts_with(action))
    }

    fn dispatch(&mut self, event: InputEvent) -> HarnessResult<()> {
        let target = event.target();
        if self.tree.live(target).is_none() {
            return Err(HarnessError::StaleHandle {
                handle: target.to_string(),
            });
        }
        let (action, entry) = match &event {
            InputEvent::Click(h) => ("click", format!("click:{h}")),
            InputEvent::Text(h, text) => ("type", format!("type:{h}:{text}")),
            InputEvent::Key(h, key) => ("key", format!("key:{h}:{key}")),
        };
        if self.reject {
            return Err(HarnessError::dispatch(action, "input injection rejected"));
        }
        self.history.push(entry);
        if let InputEvent::Click(h) = &event {
            if self.tree.get_property(*h, "checkable") == Some("1") {
                let checked = self.tree.get_property(*h, CHECKED_KEY) == Some("1");
                self.tree
                    .set_property(*h, CHECKED_KEY, if checked { "0" } else { "1" });
            }
        }
        match self.behavior.as_mut() {
            Some(behavior) => behavior.on_input(&mut self.tree, &event),
            None => Ok(()),
        }
    }
}

impl Driver for MockDriver {
    fn session(&self) -> u64 {
        self.tree.session()
    }

    fn snapshot(&self) -> HarnessResult<Vec<ElementNode>> {
        Ok(self.tree.snapshot())
    }

    fn node(&self, handle: ElementHandle) -> HarnessResult<ElementNode> {
        self.tree.node(handle).ok_or_else(|| HarnessError::StaleHandle {
            handle: handle.to_string(),
        })
    }

    fn click(&mut self, handle: ElementHandle) -> HarnessResult<()> {
        self.dispatch(InputEvent::Click(handle))
    }

    fn type_text(&mut self, handle: ElementHandle, text: &str) -> HarnessResult<()> {
        self.dispatch(InputEvent::Text(handle, text.to_string()))
    }

    fn type_key(&mut self, handle: ElementHandle, key: &str) -> HarnessResult<()> {
        self.dispatch(InputEvent::Key(handle, key.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod tree_tests {
        use super::*;

        #[test]
        fn test_snapshot_is_depth_first() {
            let mut tree = WidgetTree::new();
            let a = tree.add_root(&[("text", "a")]);
            let b = tree.add_child(a, &[("text", "b")]);
            let _ = tree.add_child(b, &[("text", "c")]);
            let _ = tree.add_child(a, &[("text", "d")]);
            let _ = tree.add_root(&[("text", "e")]);
            let texts: Vec<_> = tree.snapshot().iter().map(|n| n.text().to_string()).collect();
            assert_eq!(texts, vec!["a", "b", "c", "d", "e"]);
        }

        #[test]
        fn test_remove_subtree() {
            let mut tree = WidgetTree::new();
            let a = tree.add_root(&[("text", "a")]);
            let b = tree.add_child(a, &[("text", "b")]);
            let c = tree.add_child(b, &[("text", "c")]);
            tree.remove(b);
            assert!(tree.node(b).is_none());
            assert!(tree.node(c).is_none());
            assert!(tree.node(a).unwrap().children.is_empty());
        }

        #[test]
        fn test_clear_children() {
            let mut tree = WidgetTree::new();
            let view = tree.add_root(&[("type", "View")]);
            let _ = tree.add_child(view, &[("text", "1")]);
            let _ = tree.add_child(view, &[("text", "2")]);
            tree.clear_children(view);
            assert_eq!(tree.snapshot().len(), 1);
        }

        #[test]
        fn test_delayed_children_hidden_until_due() {
            let mut tree = WidgetTree::new();
            let view = tree.add_root(&[("type", "View")]);
            let late = tree.add_child_delayed(view, &[("text", "x")], Duration::from_secs(60));
            assert!(tree.node(late).is_none());
            assert!(tree.node(view).unwrap().children.is_empty());
            assert_eq!(tree.snapshot().len(), 1);
        }

        #[test]
        fn test_session_restart_invalidates_handles() {
            let mut tree = WidgetTree::new();
            let a = tree.add_root(&[("text", "a")]);
            tree.restart_session();
            assert!(tree.node(a).is_none());
            let fresh = tree.snapshot()[0].handle;
            assert_eq!(fresh.session(), 2);
            assert!(tree.node(fresh).is_some());
        }
    }

    mod driver_tests {
        use super::*;

        struct Echo;

        impl Behavior for Echo {
            fn on_input(&mut self, tree: &mut WidgetTree, event: &InputEvent) -> HarnessResult<()> {
                if let InputEvent::Text(h, text) = event {
                    tree.set_property(*h, "text", text.clone());
                }
                Ok(())
            }
        }

        #[test]
        fn test_behavior_sees_input() {
            let mut driver = MockDriver::new().with_behavior(Echo);
            let edit = driver.add_root(&[("type", "Edit")]);
            driver.type_text(edit, "hello").unwrap();
            assert_eq!(driver.text(edit).unwrap(), "hello");
            assert!(driver.was_called("type"));
            assert!(!driver.was_called("click"));
        }

        #[test]
        fn test_checkable_toggles() {
            let mut driver = MockDriver::new();
            let b = driver.add_root(&[("type", "QToolButton"), ("checkable", "1"), ("checked", "1")]);
            driver.click(b).unwrap();
            assert_eq!(driver.property(b, "checked").unwrap().as_deref(), Some("0"));
        }

        #[test]
        fn test_rejected_dispatch_not_recorded() {
            let mut driver = MockDriver::new();
            let b = driver.add_root(&[("type", "QToolButton")]);
            driver.reject_dispatch(true);
            assert!(driver.click(b).is_err());
            assert!(driver.history().is_empty());
        }
    }
}
