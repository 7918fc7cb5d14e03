//! Element model - immutable description nodes and the `build` factory.
//!
//! An [`Element`] is `{kind, attributes, children}` with the reserved `key`
//! attribute pulled out at build time. Children are always a flat list:
//! nested lists are flattened, empty entries (`None`, `false`, `()`) dropped,
//! and strings/numbers wrapped as text elements. [`Child`] is the raw,
//! not-yet-normalized form accepted everywhere children are passed.
//!
//! ```ignore
//! use spark_fiber::{build, children, Attributes, Kind};
//!
//! let list = build("ul", Attributes::new().with("class", "todo"), children![
//!     build("li", Attributes::new().with("key", "a"), "first"),
//!     build("li", Attributes::new().with("key", "b"), "second"),
//!     None::<&str>,
//! ]);
//! ```
//!
//! Component kinds are identified by the Rust type of their render function
//! (or class), so rebuilding an element from the same function on every
//! render keeps its identity stable.

use std::any::TypeId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{EffectError, RenderError};
use crate::hooks::ContextId;
use crate::pipeline::Updater;
use crate::types::{AttrValue, Attributes, Props, KEY_ATTRIBUTE, TEXT_VALUE_ATTRIBUTE};

/// What a component body returns.
pub type Rendered = Result<Child, RenderError>;

// =============================================================================
// Function components
// =============================================================================

/// A function component: `Fn(&Props) -> Rendered`.
///
/// Two function components are the same kind when their closures have the
/// same Rust type.
#[derive(Clone)]
pub struct FunctionComponent {
    id: TypeId,
    name: &'static str,
    render: Rc<dyn Fn(&Props) -> Rendered>,
}

impl FunctionComponent {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&Props) -> Rendered + 'static,
    {
        Self {
            id: TypeId::of::<F>(),
            name: short_type_name(std::any::type_name::<F>()),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn call(&self, props: &Props) -> Rendered {
        (self.render)(props)
    }
}

impl PartialEq for FunctionComponent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for FunctionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionComponent({})", self.name)
    }
}

// =============================================================================
// Class components
// =============================================================================

/// Stateful component with a retained instance.
///
/// The instance is created on mount, kept across generations while the
/// element at its position keeps the same class, handed the new props through
/// [`set_props`](ClassComponent::set_props) before each
/// [`render`](ClassComponent::render), and dropped after
/// [`will_unmount`](ClassComponent::will_unmount).
///
/// Hooks are not available inside class components.
pub trait ClassComponent: 'static {
    fn create(props: &Props, updater: Updater) -> Self
    where
        Self: Sized;

    /// Reassign the instance's props for this generation.
    fn set_props(&mut self, props: &Props);

    fn render(&mut self) -> Rendered;

    fn did_mount(&mut self) -> Result<(), EffectError> {
        Ok(())
    }

    fn did_update(&mut self) -> Result<(), EffectError> {
        Ok(())
    }

    fn will_unmount(&mut self) -> Result<(), EffectError> {
        Ok(())
    }
}

/// Shared handle to a live class instance.
pub type ClassInstance = Rc<RefCell<dyn ClassComponent>>;

/// Kind descriptor of a class component.
#[derive(Clone)]
pub struct ClassType {
    id: TypeId,
    name: &'static str,
    construct: fn(&Props, Updater) -> ClassInstance,
}

impl ClassType {
    pub fn of<C: ClassComponent>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: short_type_name(std::any::type_name::<C>()),
            construct: construct_instance::<C>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn construct(&self, props: &Props, updater: Updater) -> ClassInstance {
        (self.construct)(props, updater)
    }
}

fn construct_instance<C: ClassComponent>(props: &Props, updater: Updater) -> ClassInstance {
    Rc::new(RefCell::new(C::create(props, updater)))
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassType({})", self.name)
    }
}

/// Last path segment of a type name that is not a closure marker.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::")
        .find(|segment| !segment.is_empty() && !segment.starts_with("{{"))
        .unwrap_or(full)
}

// =============================================================================
// Element kinds
// =============================================================================

/// Closed set of element kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum ElementKind {
    /// Host tag such as `div`
    Host(Rc<str>),
    /// Text leaf; content lives in the `nodeValue` attribute
    Text,
    Function(FunctionComponent),
    Class(ClassType),
    /// Context provider; value lives in the `value` attribute
    Provider(ContextId),
}

impl ElementKind {
    /// Human-readable label for logs and commit records.
    pub fn label(&self) -> String {
        match self {
            ElementKind::Host(tag) => tag.to_string(),
            ElementKind::Text => "#text".into(),
            ElementKind::Function(f) => f.name().into(),
            ElementKind::Class(c) => c.name().into(),
            ElementKind::Provider(id) => format!("Provider({})", id.raw()),
        }
    }
}

/// Kind argument accepted by [`build`]: any element kind or the fragment marker.
#[derive(Clone, Debug, PartialEq)]
pub enum Kind {
    Element(ElementKind),
    /// Fragment marker: `build` returns the children as a list
    Fragment,
}

impl Kind {
    pub fn component<F>(render: F) -> Self
    where
        F: Fn(&Props) -> Rendered + 'static,
    {
        Kind::Element(ElementKind::Function(FunctionComponent::new(render)))
    }

    pub fn class<C: ClassComponent>() -> Self {
        Kind::Element(ElementKind::Class(ClassType::of::<C>()))
    }

    pub fn text() -> Self {
        Kind::Element(ElementKind::Text)
    }
}

impl From<&str> for Kind {
    fn from(tag: &str) -> Self {
        Kind::Element(ElementKind::Host(Rc::from(tag)))
    }
}

impl From<ElementKind> for Kind {
    fn from(kind: ElementKind) -> Self {
        Kind::Element(kind)
    }
}

// =============================================================================
// Element
// =============================================================================

struct ElementInner {
    kind: ElementKind,
    key: Option<Rc<str>>,
    props: Props,
}

/// Immutable description node. Cheap to clone.
#[derive(Clone)]
pub struct Element(Rc<ElementInner>);

impl Element {
    /// Build an element, extracting the reserved `key` attribute.
    pub fn new(kind: ElementKind, mut attributes: Attributes, children: Vec<Element>) -> Self {
        let key = attributes
            .remove(KEY_ATTRIBUTE)
            .and_then(|value| match value {
                AttrValue::Str(s) => Some(s),
                other => other.to_attribute_string().map(Rc::from),
            });
        Element(Rc::new(ElementInner {
            kind,
            key,
            props: Props::new(attributes, children),
        }))
    }

    /// Text leaf.
    pub fn text(value: impl Into<Rc<str>>) -> Self {
        let value: Rc<str> = value.into();
        Self::new(
            ElementKind::Text,
            Attributes::new().with(TEXT_VALUE_ATTRIBUTE, value),
            Vec::new(),
        )
    }

    pub fn kind(&self) -> &ElementKind {
        &self.0.kind
    }

    pub fn key(&self) -> Option<&Rc<str>> {
        self.0.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn children(&self) -> &[Element] {
        self.0.props.children()
    }

    /// Text content for text elements.
    pub fn text_value(&self) -> Option<&str> {
        match self.0.kind {
            ElementKind::Text => self.0.props.str(TEXT_VALUE_ATTRIBUTE),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Element");
        s.field("kind", &self.0.kind.label());
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        s.field("attributes", self.0.props.attributes())
            .field("children", &self.0.props.children())
            .finish()
    }
}

// =============================================================================
// Child - raw children before normalization
// =============================================================================

/// A child as written by the caller, before normalization.
#[derive(Clone, Debug)]
pub enum Child {
    Element(Element),
    /// Primitive content, becomes an implicit text element
    Text(Rc<str>),
    /// Nested list, flattened at any depth
    List(Vec<Child>),
    /// `None`/`false`/`()`: dropped
    Empty,
}

impl Child {
    /// Flatten into the normalized child list.
    pub fn into_elements(self) -> Vec<Element> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<Element>) {
        match self {
            Child::Element(element) => out.push(element),
            Child::Text(text) => out.push(Element::text(text)),
            Child::List(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
            Child::Empty => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Child::Empty => true,
            Child::List(items) => items.iter().all(Child::is_empty),
            _ => false,
        }
    }
}

impl Default for Child {
    fn default() -> Self {
        Child::Empty
    }
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Element(element)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<Rc<str>> for Child {
    fn from(text: Rc<str>) -> Self {
        Child::Text(text)
    }
}

macro_rules! child_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Child::Text(Rc::from(value.to_string()))
                }
            }
        )*
    };
}

child_from_number!(i32, i64, u32, u64, usize, f32, f64);

/// `false` is dropped; `true` renders as the text `"true"`.
impl From<bool> for Child {
    fn from(value: bool) -> Self {
        if value { Child::from("true") } else { Child::Empty }
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::List(items.into_iter().map(Into::into).collect())
    }
}

/// Heterogeneous child list: `children![element, "text", None::<Element>]`.
#[macro_export]
macro_rules! children {
    ($($child:expr),* $(,)?) => {
        $crate::element::Child::List(vec![$($crate::element::Child::from($child)),*])
    };
}

// =============================================================================
// build - the element factory boundary
// =============================================================================

/// Create an element (or, for [`Kind::Fragment`], a list of elements).
///
/// The attribute map is taken by value; the normalized children become the
/// element's `children`.
pub fn build(kind: impl Into<Kind>, attributes: Attributes, children: impl Into<Child>) -> Child {
    let children = children.into().into_elements();
    match kind.into() {
        Kind::Fragment => Child::List(children.into_iter().map(Child::Element).collect()),
        Kind::Element(kind) => Child::Element(Element::new(kind, attributes, children)),
    }
}

/// Host element shorthand.
pub fn h(tag: &str, attributes: Attributes, children: impl Into<Child>) -> Element {
    Element::new(
        ElementKind::Host(Rc::from(tag)),
        attributes,
        children.into().into_elements(),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(elements: &[Element]) -> Vec<&str> {
        elements.iter().filter_map(Element::text_value).collect()
    }

    #[test]
    fn test_children_flatten_and_drop_empty() {
        let child = children![
            "a",
            vec![Child::from("b"), Child::List(vec![Child::from(3)])],
            None::<&str>,
            false,
            (),
        ];
        let elements = child.into_elements();
        assert_eq!(texts(&elements), vec!["a", "b", "3"]);
    }

    #[test]
    fn test_build_extracts_key() {
        let Child::Element(element) = build("li", Attributes::new().with("key", "x").with("id", "i"), ()) else {
            panic!("expected a single element");
        };
        assert_eq!(element.key().map(|k| k.as_ref()), Some("x"));
        assert!(element.props().get("key").is_none());
        assert_eq!(element.props().str("id"), Some("i"));
    }

    #[test]
    fn test_numeric_key_is_stringified() {
        let element = h("li", Attributes::new().with("key", 7), ());
        assert_eq!(element.key().map(|k| k.as_ref()), Some("7"));
    }

    #[test]
    fn test_fragment_returns_list() {
        let fragment = build(Kind::Fragment, Attributes::new(), children!["a", "b"]);
        let Child::List(items) = &fragment else {
            panic!("fragment must build a list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(fragment.into_elements().len(), 2);
    }

    #[test]
    fn test_children_land_in_props() {
        let element = h("div", Attributes::new(), children!["x", h("span", Attributes::new(), ())]);
        assert_eq!(element.children().len(), 2);
        assert_eq!(element.props().children().len(), 2);
    }

    #[test]
    fn test_function_kind_identity_follows_type() {
        fn make() -> Kind {
            Kind::component(|_props: &Props| Ok(Child::Empty))
        }
        let other = Kind::component(|_props: &Props| Ok(Child::Empty));

        assert_eq!(make(), make());
        assert_ne!(make(), other);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("my_app::ui::counter"), "counter");
        assert_eq!(short_type_name("my_app::ui::app::{{closure}}"), "app");
        assert_eq!(short_type_name("my_app::Widget<u8>"), "Widget");
    }

    #[test]
    fn test_empty_child_detection() {
        assert!(Child::from(None::<Element>).is_empty());
        assert!(children![(), false].is_empty());
        assert!(!Child::from("x").is_empty());
    }

    #[test]
    fn test_true_becomes_text() {
        let elements = children!["on: ", true, false].into_elements();
        assert_eq!(texts(&elements), vec!["on: ", "true"]);
    }
}
