//! In-memory output tree.
//!
//! A minimal retained DOM: element and text nodes in a flat arena addressed
//! by [`NodeId`], string attributes, typed properties for the names a browser
//! treats as properties (`value`, `checked`, `disabled`, `selected`,
//! `hidden`), a style map, a class list and event listeners. It serialises to
//! HTML and dispatches events with bubbling, which is enough to observe
//! everything the commit engine does.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::trace;

use super::Host;
use crate::types::{AttrValue, Event, EventListener};

/// Names stored as typed properties instead of string attributes.
const PROPERTY_NAMES: &[&str] = &["value", "checked", "disabled", "selected", "hidden"];

/// Handle of a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena slot of the node.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Default)]
struct ElementData {
    tag: String,
    attributes: BTreeMap<String, String>,
    properties: BTreeMap<String, AttrValue>,
    style: BTreeMap<String, String>,
    classes: Vec<String>,
    listeners: Vec<(String, EventListener)>,
}

enum Content {
    Element(ElementData),
    Text(String),
}

struct DomNode {
    content: Content,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Mutation counters, for asserting how much work a commit did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomStats {
    pub elements_created: usize,
    pub texts_created: usize,
    pub text_updates: usize,
    pub appends: usize,
    pub removals: usize,
    pub properties_set: usize,
    pub properties_removed: usize,
    pub listeners_added: usize,
    pub listeners_removed: usize,
}

impl DomStats {
    /// Every counted host call.
    pub fn total(&self) -> usize {
        self.elements_created
            + self.texts_created
            + self.text_updates
            + self.appends
            + self.removals
            + self.properties_set
            + self.properties_removed
            + self.listeners_added
            + self.listeners_removed
    }
}

/// In-memory [`Host`].
#[derive(Default)]
pub struct MemoryDom {
    nodes: Vec<DomNode>,
    stats: DomStats,
}

impl MemoryDom {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh detached `div` to render into. Not counted in [`DomStats`].
    pub fn create_container(&mut self) -> NodeId {
        self.push(Content::Element(ElementData {
            tag: "div".into(),
            ..ElementData::default()
        }))
    }

    fn push(&mut self, content: Content) -> NodeId {
        self.nodes.push(DomNode {
            content,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(node.0)?.content {
            Content::Element(element) => Some(element),
            Content::Text(_) => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(node.0)?.content {
            Content::Element(element) => Some(element),
            Content::Text(_) => None,
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Mutation counters since creation or the last reset.
    pub fn stats(&self) -> DomStats {
        self.stats
    }

    /// Zero the mutation counters.
    pub fn reset_stats(&mut self) {
        self.stats = DomStats::default();
    }

    /// Nodes ever created, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Tag of an element node.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag.as_str())
    }

    /// Content of a text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.content {
            Content::Text(text) => Some(text),
            Content::Element(_) => None,
        }
    }

    /// String attribute of an element.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attributes.get(name).map(String::as_str)
    }

    /// Typed property (`value`, `checked`, ...) of an element.
    pub fn property(&self, node: NodeId, name: &str) -> Option<&AttrValue> {
        self.element(node)?.properties.get(name)
    }

    /// One entry of an element's style map.
    pub fn style(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.style.get(name).map(String::as_str)
    }

    /// Class list of an element, in insertion order.
    pub fn classes(&self, node: NodeId) -> Vec<&str> {
        self.element(node)
            .map(|element| element.classes.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether an element carries `class`.
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node)
            .is_some_and(|element| element.classes.iter().any(|c| c == class))
    }

    /// Listeners registered on an element for `event`.
    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.element(node)
            .map(|element| element.listeners.iter().filter(|(name, _)| name == event).count())
            .unwrap_or(0)
    }

    /// Node `node` is attached to.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    /// Children of `node`, in order.
    pub fn child_nodes(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(dom_node) = self.nodes.get(node.0) else {
            return;
        };
        match &dom_node.content {
            Content::Text(text) => out.push_str(text),
            Content::Element(_) => {
                for &child in &dom_node.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// First node at or below `root` (pre-order) whose attribute `name` equals `value`.
    pub fn find_by_attribute(&self, root: NodeId, name: &str, value: &str) -> Option<NodeId> {
        if self.attribute(root, name) == Some(value) {
            return Some(root);
        }
        self.child_nodes(root)
            .iter()
            .find_map(|&child| self.find_by_attribute(child, name, value))
    }

    /// Every element at or below `root` with tag `tag`, in document order.
    pub fn find_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.tag(node) == Some(tag) {
                out.push(node);
            }
            stack.extend(self.child_nodes(node).iter().rev());
        }
        out
    }

    // =========================================================================
    // Serialisation
    // =========================================================================

    /// `node` as HTML.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Children of `node` as HTML.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.child_nodes(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(dom_node) = self.nodes.get(node.0) else {
            return;
        };
        let element = match &dom_node.content {
            Content::Text(text) => {
                out.push_str(&escape(text, false));
                return;
            }
            Content::Element(element) => element,
        };

        // Attributes, class, style and properties share one sorted namespace
        let mut rendered: BTreeMap<&str, Option<String>> = element
            .attributes
            .iter()
            .map(|(name, value)| (name.as_str(), Some(value.clone())))
            .collect();
        if !element.classes.is_empty() {
            rendered.insert("class", Some(element.classes.join(" ")));
        }
        if !element.style.is_empty() {
            let style = element
                .style
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("; ");
            rendered.insert("style", Some(style));
        }
        for (name, value) in &element.properties {
            match value {
                AttrValue::Bool(true) => {
                    rendered.insert(name.as_str(), None);
                }
                AttrValue::Bool(false) | AttrValue::Any(_) => {}
                other => {
                    if let Some(text) = other.to_attribute_string() {
                        rendered.insert(name.as_str(), Some(text));
                    }
                }
            }
        }

        let _ = write!(out, "<{}", element.tag);
        for (name, value) in rendered {
            match value {
                Some(value) => {
                    let _ = write!(out, " {name}=\"{}\"", escape(&value, true));
                }
                None => {
                    let _ = write!(out, " {name}");
                }
            }
        }
        out.push('>');
        for &child in &dom_node.children {
            self.write_html(child, out);
        }
        let _ = write!(out, "</{}>", element.tag);
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Deliver `event` to `target` and then to each ancestor.
    ///
    /// Listeners are collected before any runs. Returns how many ran.
    pub fn dispatch_event(&self, target: NodeId, event: &Event) -> usize {
        let mut listeners = Vec::new();
        let mut current = Some(target);
        while let Some(node) = current {
            if let Some(element) = self.element(node) {
                listeners.extend(
                    element
                        .listeners
                        .iter()
                        .filter(|(name, _)| *name == event.name)
                        .map(|(_, listener)| listener.clone()),
                );
            }
            current = self.parent(node);
        }

        trace!(?target, event = %event.name, listeners = listeners.len(), "dispatch");
        for listener in &listeners {
            listener.call(event);
        }
        listeners.len()
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != child);
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

fn parse_style(style: &str) -> BTreeMap<String, String> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

impl Host for MemoryDom {
    type Node = NodeId;

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.stats.elements_created += 1;
        let node = self.push(Content::Element(ElementData {
            tag: tag.to_string(),
            ..ElementData::default()
        }));
        trace!(?node, tag, "create element");
        node
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.stats.texts_created += 1;
        let node = self.push(Content::Text(text.to_string()));
        trace!(?node, text, "create text");
        node
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        self.stats.text_updates += 1;
        trace!(?node, text, "set text");
        if let Some(DomNode {
            content: Content::Text(current),
            ..
        }) = self.nodes.get_mut(node.0)
        {
            *current = text.to_string();
        }
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        self.stats.appends += 1;
        trace!(?parent, ?child, "append child");
        self.detach(*child);
        self.nodes[child.0].parent = Some(*parent);
        self.nodes[parent.0].children.push(*child);
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
        if !self.contains(parent, child) {
            return;
        }
        self.stats.removals += 1;
        trace!(?parent, ?child, "remove child");
        self.detach(*child);
    }

    fn contains(&self, parent: &NodeId, child: &NodeId) -> bool {
        self.parent(*child) == Some(*parent)
    }

    fn children(&self, parent: &NodeId) -> Vec<NodeId> {
        self.child_nodes(*parent).to_vec()
    }

    fn set_property(&mut self, node: &NodeId, name: &str, value: &AttrValue) {
        self.stats.properties_set += 1;
        trace!(?node, name, ?value, "set property");
        let Some(element) = self.element_mut(*node) else {
            return;
        };
        match (name, value) {
            ("style", AttrValue::Style(style)) => element.style = (**style).clone(),
            ("style", other) => element.style = parse_style(&other.to_attribute_string().unwrap_or_default()),
            ("class" | "className", AttrValue::Classes(classes)) => {
                element.classes = classes.iter().map(|c| c.to_string()).collect();
            }
            ("class" | "className", other) => {
                element.classes = other
                    .to_attribute_string()
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(String::from)
                    .collect();
            }
            (name, value) if PROPERTY_NAMES.contains(&name) => {
                element.properties.insert(name.to_string(), value.clone());
            }
            (name, value) => match value.to_attribute_string() {
                Some(text) => {
                    element.attributes.insert(name.to_string(), text);
                }
                None => {
                    element.properties.insert(name.to_string(), value.clone());
                }
            },
        }
    }

    fn remove_property(&mut self, node: &NodeId, name: &str) {
        self.stats.properties_removed += 1;
        trace!(?node, name, "remove property");
        let Some(element) = self.element_mut(*node) else {
            return;
        };
        match name {
            "style" => element.style.clear(),
            "class" | "className" => element.classes.clear(),
            name => {
                element.properties.remove(name);
                element.attributes.remove(name);
            }
        }
    }

    fn add_event_listener(&mut self, node: &NodeId, event: &str, listener: EventListener) {
        self.stats.listeners_added += 1;
        trace!(?node, event, "add listener");
        if let Some(element) = self.element_mut(*node) {
            element.listeners.push((event.to_string(), listener));
        }
    }

    fn remove_event_listener(&mut self, node: &NodeId, event: &str, listener: &EventListener) {
        self.stats.listeners_removed += 1;
        trace!(?node, event, "remove listener");
        if let Some(element) = self.element_mut(*node) {
            if let Some(position) = element
                .listeners
                .iter()
                .position(|(name, existing)| name == event && existing.ptr_eq(listener))
            {
                element.listeners.remove(position);
            }
        }
    }
}
