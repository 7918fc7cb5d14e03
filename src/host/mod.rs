//! Output-tree boundary.
//!
//! The commit engine never touches an output tree directly; it goes through
//! [`Host`]. Nodes are opaque handles (`Host::Node`) that the work units store
//! and hand back. [`MemoryDom`] is the in-memory implementation used by tests
//! and the demo.

mod memory;

pub use memory::{DomStats, MemoryDom, NodeId};

use std::fmt;

use crate::types::{AttrValue, EventListener};

/// Retained output tree the commit engine mutates.
pub trait Host {
    /// Handle of one output node.
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn create_text(&mut self, text: &str) -> Self::Node;

    fn set_text(&mut self, node: &Self::Node, text: &str);

    /// Append `child` as the last child of `parent`.
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node);

    /// Whether `child` is currently a direct child of `parent`.
    fn contains(&self, parent: &Self::Node, child: &Self::Node) -> bool;

    fn children(&self, parent: &Self::Node) -> Vec<Self::Node>;

    /// Set an attribute or, for node-specific names, a property.
    fn set_property(&mut self, node: &Self::Node, name: &str, value: &AttrValue);

    fn remove_property(&mut self, node: &Self::Node, name: &str);

    fn add_event_listener(&mut self, node: &Self::Node, event: &str, listener: EventListener);

    fn remove_event_listener(&mut self, node: &Self::Node, event: &str, listener: &EventListener);
}
