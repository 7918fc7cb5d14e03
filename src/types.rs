//! Core types for spark-fiber.
//!
//! These types flow through every stage of the pipeline: elements carry
//! [`Attributes`], work units carry [`Props`] and a [`MutationTag`], and the
//! commit engine hands [`AttrValue`]s to the host.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::element::Element;

// =============================================================================
// Reserved attribute names
// =============================================================================

/// Attribute holding an element's reconciliation key. Extracted at build time.
pub const KEY_ATTRIBUTE: &str = "key";

/// Attribute holding a ref callback for host elements.
pub const REF_ATTRIBUTE: &str = "ref";

/// Attribute holding a text element's content.
pub const TEXT_VALUE_ATTRIBUTE: &str = "nodeValue";

/// Attribute holding a context provider's value.
pub const PROVIDER_VALUE_ATTRIBUTE: &str = "value";

/// Prefix marking an attribute as an event listener (`onClick` -> `click`).
pub const LISTENER_PREFIX: &str = "on";

/// Map a listener attribute name to the host event name.
///
/// `onClick` becomes `click`; names without the `on` prefix pass through lowercased.
pub fn event_name(attribute: &str) -> String {
    match attribute.strip_prefix(LISTENER_PREFIX) {
        Some(rest) if !rest.is_empty() => rest.to_ascii_lowercase(),
        _ => attribute.to_ascii_lowercase(),
    }
}

// =============================================================================
// Key
// =============================================================================

/// Identity of a child among its siblings during keyed reconciliation.
///
/// Explicit keys and positional indices never collide: `Explicit("0")` and
/// `Index(0)` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// The element's `key` attribute.
    Explicit(Rc<str>),
    /// Position among siblings, used when no key was given.
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Explicit(key) => write!(f, "{key}"),
            Key::Index(index) => write!(f, "#{index}"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Event delivered to listeners by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// Event name without the `on` prefix (`click`, `input`, ...)
    pub name: String,
    /// Payload such as an input's new value
    pub value: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Event listener attached to a host node.
///
/// Identity is the shared closure: two listeners are equal only when they are
/// clones of the same `EventListener`.
#[derive(Clone)]
pub struct EventListener(Rc<dyn Fn(&Event)>);

impl EventListener {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventListener({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Ref callback, invoked with the host node after placement and with `None`
/// when the node is removed or the callback is replaced.
#[derive(Clone)]
pub struct RefCallback(Rc<dyn Fn(Option<&dyn Any>)>);

impl RefCallback {
    pub fn new(callback: impl Fn(Option<&dyn Any>) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn call(&self, node: Option<&dyn Any>) {
        (self.0)(node)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RefCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefCallback({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

// =============================================================================
// Attribute values
// =============================================================================

/// Value of a single attribute.
///
/// Scalars compare by value; listeners, refs and opaque payloads compare by
/// identity.
#[derive(Clone)]
pub enum AttrValue {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Key/value style map (`style`)
    Style(Rc<BTreeMap<String, String>>),
    /// Class list (`class`)
    Classes(Rc<[Rc<str>]>),
    Listener(EventListener),
    Ref(RefCallback),
    /// Opaque payload, usually component data or a provider value
    Any(Rc<dyn Any>),
}

impl AttrValue {
    pub fn style<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        AttrValue::Style(Rc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn classes<S: AsRef<str>>(classes: impl IntoIterator<Item = S>) -> Self {
        AttrValue::Classes(classes.into_iter().map(|c| Rc::from(c.as_ref())).collect())
    }

    pub fn any<T: 'static>(value: T) -> Self {
        AttrValue::Any(Rc::new(value))
    }

    pub fn listener(handler: impl Fn(&Event) + 'static) -> Self {
        AttrValue::Listener(EventListener::new(handler))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Render a scalar as the string a host attribute would hold.
    pub fn to_attribute_string(&self) -> Option<String> {
        match self {
            AttrValue::Str(s) => Some(s.to_string()),
            AttrValue::Int(i) => Some(i.to_string()),
            AttrValue::Float(v) => Some(v.to_string()),
            AttrValue::Bool(b) => Some(b.to_string()),
            AttrValue::Classes(classes) => Some(classes.join(" ")),
            AttrValue::Style(style) => Some(
                style
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            AttrValue::Listener(_) | AttrValue::Ref(_) | AttrValue::Any(_) => None,
        }
    }
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Str(a), AttrValue::Str(b)) => a == b,
            (AttrValue::Int(a), AttrValue::Int(b)) => a == b,
            (AttrValue::Float(a), AttrValue::Float(b)) => a == b,
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
            (AttrValue::Style(a), AttrValue::Style(b)) => Rc::ptr_eq(a, b) || a == b,
            (AttrValue::Classes(a), AttrValue::Classes(b)) => Rc::ptr_eq(a, b) || a == b,
            (AttrValue::Listener(a), AttrValue::Listener(b)) => a.ptr_eq(b),
            (AttrValue::Ref(a), AttrValue::Ref(b)) => a.ptr_eq(b),
            (AttrValue::Any(a), AttrValue::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{s:?}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Style(style) => f.debug_map().entries(style.iter()).finish(),
            AttrValue::Classes(classes) => f.debug_list().entries(classes.iter()).finish(),
            AttrValue::Listener(l) => l.fmt(f),
            AttrValue::Ref(r) => r.fmt(f),
            AttrValue::Any(_) => write!(f, "Any(..)"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(Rc::from(value))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for AttrValue {
    fn from(value: Rc<str>) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        AttrValue::Int(value as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<EventListener> for AttrValue {
    fn from(value: EventListener) -> Self {
        AttrValue::Listener(value)
    }
}

impl From<RefCallback> for AttrValue {
    fn from(value: RefCallback) -> Self {
        AttrValue::Ref(value)
    }
}

// =============================================================================
// Attributes
// =============================================================================

/// Ordered attribute map of one element.
///
/// Never mutated once attached to an element; builders consume `self`.
#[derive(Clone, Default, PartialEq)]
pub struct Attributes(BTreeMap<Rc<str>, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an attribute.
    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.0.insert(Rc::from(name), value.into());
        self
    }

    /// Add an event listener: `on("click", ..)` stores `onClick`.
    pub fn on(self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        let mut chars = event.chars();
        let name = match chars.next() {
            Some(first) => format!("{LISTENER_PREFIX}{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => LISTENER_PREFIX.to_string(),
        };
        self.with(&name, EventListener::new(handler))
    }

    pub fn insert(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.0.insert(Rc::from(name), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

// =============================================================================
// Props
// =============================================================================

/// What a component (or a work unit) receives for one generation: the
/// element's attributes plus its normalized children.
///
/// Cheap to clone; both halves are shared.
#[derive(Clone, Default)]
pub struct Props {
    attributes: Rc<Attributes>,
    children: Rc<[Element]>,
}

impl Props {
    pub fn new(attributes: Attributes, children: Vec<Element>) -> Self {
        Self {
            attributes: Rc::new(attributes),
            children: children.into(),
        }
    }

    pub(crate) fn from_children(children: Rc<[Element]>) -> Self {
        Self {
            attributes: Rc::default(),
            children,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub(crate) fn shared_children(&self) -> Rc<[Element]> {
        self.children.clone()
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttrValue::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(AttrValue::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(AttrValue::as_bool)
    }

    /// Typed access to an [`AttrValue::Any`] payload.
    pub fn value<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        match self.get(name)? {
            AttrValue::Any(any) => any.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Same attribute map and child list as `other` (identity, not content).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.attributes, &other.attributes) && Rc::ptr_eq(&self.children, &other.children)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("attributes", &self.attributes)
            .field("children", &self.children.len())
            .finish()
    }
}

// =============================================================================
// Mutation tags and unit flags
// =============================================================================

/// Mutation the commit engine must apply for a work unit.
///
/// Set once per generation by the reconciler and cleared by the commit engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationTag {
    #[default]
    None,
    Create,
    Update,
    Remove,
}

impl fmt::Display for MutationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationTag::None => "NONE",
            MutationTag::Create => "CREATE",
            MutationTag::Update => "UPDATE",
            MutationTag::Remove => "REMOVE",
        };
        f.write_str(name)
    }
}

bitflags::bitflags! {
    /// Work a unit owes to the passes that run after rendering.
    ///
    /// A unit's own flags are bubbled into its parent's `subtree_flags` when the
    /// work loop completes it, so later passes can skip whole subtrees.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct UnitFlags: u8 {
        const NONE = 0;
        /// An effect hook is due to run after this commit.
        const PASSIVE_EFFECT = 1 << 0;
        /// A class instance expects `did_mount`/`did_update`.
        const LIFECYCLE = 1 << 1;
        /// Removing this unit runs cleanups (effect hooks, class instance, ref).
        const TEARDOWN = 1 << 2;
        /// A state hook consumed queued updates during this render.
        const STATE_UPDATE = 1 << 3;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("onClick", "click")]
    #[test_case("onInput", "input")]
    #[test_case("onDoubleClick", "doubleclick")]
    #[test_case("change", "change")]
    #[test_case("on", "on")]
    fn test_event_name(attribute: &str, expected: &str) {
        assert_eq!(event_name(attribute), expected);
    }

    #[test]
    fn test_attr_value_scalar_equality() {
        assert_eq!(AttrValue::from("a"), AttrValue::from(String::from("a")));
        assert_eq!(AttrValue::from(3), AttrValue::Int(3));
        assert_ne!(AttrValue::from(3), AttrValue::from("3"));
        assert_eq!(AttrValue::style([("color", "red")]), AttrValue::style([("color", "red")]));
    }

    #[test]
    fn test_listener_identity() {
        let a = EventListener::new(|_| {});
        let b = EventListener::new(|_| {});
        assert_eq!(AttrValue::from(a.clone()), AttrValue::from(a.clone()));
        assert_ne!(AttrValue::from(a), AttrValue::from(b));
    }

    #[test]
    fn test_attributes_on_builds_listener_name() {
        let attrs = Attributes::new().on("click", |_| {});
        assert!(matches!(attrs.get("onClick"), Some(AttrValue::Listener(_))));
    }

    #[test]
    fn test_props_typed_value() {
        #[derive(Debug, PartialEq)]
        struct Payload(u8);

        let props = Props::new(Attributes::new().with("data", AttrValue::any(Payload(7))), vec![]);
        assert_eq!(props.value::<Payload>("data").as_deref(), Some(&Payload(7)));
        assert!(props.value::<String>("data").is_none());
        assert!(props.value::<Payload>("missing").is_none());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::Explicit(Rc::from("a")).to_string(), "a");
        assert_eq!(Key::Index(2).to_string(), "#2");
        assert_ne!(Key::Explicit(Rc::from("0")), Key::Index(0));
    }

    #[test]
    fn test_classes_to_attribute_string() {
        assert_eq!(
            AttrValue::classes(["a", "b"]).to_attribute_string().as_deref(),
            Some("a b")
        );
        assert_eq!(AttrValue::from(true).to_attribute_string().as_deref(), Some("true"));
        assert!(AttrValue::listener(|_| {}).to_attribute_string().is_none());
    }
}
