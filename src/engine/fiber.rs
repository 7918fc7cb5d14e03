//! Work unit ("fiber") - reconciliation state of one node for one generation.
//!
//! Navigation is by [`FiberId`] into the owning [`FiberArena`](super::FiberArena):
//! `parent` is a back-reference only, children are reached through `child`
//! then the `sibling` chain, and `alternate` points at the previous
//! generation's unit at the same position (diff lookups and hook carry-over).
//! None of these links owns anything; the arena owns every unit.

use std::fmt;
use std::rc::Rc;

use crate::element::{ClassInstance, ElementKind};
use crate::hooks::HookSlot;
use crate::types::{Key, MutationTag, Props, UnitFlags};

/// Index of a work unit inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId(pub(crate) usize);

impl FiberId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Kind of a work unit: the generation root or the kind of its element.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitKind {
    /// Bound to the container; its children are the rendered elements.
    Root,
    Element(ElementKind),
}

impl UnitKind {
    /// Whether an element of `kind` can update this unit in place.
    pub fn matches(&self, kind: &ElementKind) -> bool {
        match self {
            UnitKind::Root => false,
            UnitKind::Element(own) => own == kind,
        }
    }

    pub fn label(&self) -> String {
        match self {
            UnitKind::Root => "#root".into(),
            UnitKind::Element(kind) => kind.label(),
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(
            self,
            UnitKind::Element(ElementKind::Function(_) | ElementKind::Class(_))
        )
    }
}

/// One node of the work-unit tree.
pub struct Fiber<N> {
    pub(crate) kind: UnitKind,
    pub(crate) props: Props,
    pub(crate) key: Option<Rc<str>>,
    /// Position among siblings in this generation
    pub(crate) index: usize,
    /// Output-tree node owned by this unit (host and text units only)
    pub(crate) node: Option<N>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) tag: MutationTag,
    pub(crate) flags: UnitFlags,
    pub(crate) subtree_flags: UnitFlags,
    /// Hook records in call order (component units only)
    pub(crate) hooks: Vec<HookSlot>,
    pub(crate) instance: Option<ClassInstance>,
}

impl<N> Fiber<N> {
    pub(crate) fn new(kind: UnitKind, props: Props, key: Option<Rc<str>>) -> Self {
        Self {
            kind,
            props,
            key,
            index: 0,
            node: None,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            tag: MutationTag::None,
            flags: UnitFlags::NONE,
            subtree_flags: UnitFlags::NONE,
            hooks: Vec::new(),
            instance: None,
        }
    }

    /// What this unit renders.
    pub fn kind(&self) -> &UnitKind {
        &self.kind
    }

    /// Props of this generation, children included.
    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Explicit key, if the element carried one.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Key used by keyed reconciliation: the explicit key, else the position.
    pub fn reconcile_key(&self) -> Key {
        match &self.key {
            Some(key) => Key::Explicit(key.clone()),
            None => Key::Index(self.index),
        }
    }

    /// Host node owned by this unit (host and text units only).
    pub fn node(&self) -> Option<&N> {
        self.node.as_ref()
    }

    /// Parent unit; `None` for the root.
    pub fn parent(&self) -> Option<FiberId> {
        self.parent
    }

    /// First child unit.
    pub fn child(&self) -> Option<FiberId> {
        self.child
    }

    /// Next sibling unit.
    pub fn sibling(&self) -> Option<FiberId> {
        self.sibling
    }

    /// Same unit in the previously committed tree.
    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    /// Mutation the next commit applies to this unit.
    pub fn tag(&self) -> MutationTag {
        self.tag
    }

    /// Post-render work owed by this unit itself.
    pub fn flags(&self) -> UnitFlags {
        self.flags
    }

    /// Union of the flags of every descendant.
    pub fn subtree_flags(&self) -> UnitFlags {
        self.subtree_flags
    }

    /// Number of hook records of the last render.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Class component instance, for class units.
    pub fn instance(&self) -> Option<&ClassInstance> {
        self.instance.as_ref()
    }

    /// Short name for logs: tag, `#text` or component name.
    pub fn label(&self) -> String {
        self.kind.label()
    }
}

impl<N: fmt::Debug> fmt::Debug for Fiber<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("kind", &self.kind.label())
            .field("key", &self.key)
            .field("node", &self.node)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("sibling", &self.sibling)
            .field("alternate", &self.alternate)
            .field("tag", &self.tag)
            .field("flags", &self.flags)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
