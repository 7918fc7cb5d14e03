//! Reconciler - diff one unit's previous children against its new elements.
//!
//! Produces the next generation's child units, tagged for the commit engine,
//! and appends every superseded previous-generation child to the deletion
//! list. Two strategies, both linear in the number of children:
//!
//! - **Positional**: old and new children are walked in lockstep by index.
//!   Same kind at a position means UPDATE; a kind change means REMOVE of the
//!   old unit plus CREATE of the new one, never a patch across kinds.
//! - **Keyed**: old children are looked up by key (explicit key, else index).
//!   A match of the same kind is consumed and updated in place, whatever its
//!   new position; everything not consumed is removed.
//!
//! Keyed matches keep their output node but the node is not moved: the commit
//! engine has no move operation and only appends new nodes, so a reorder
//! changes which unit owns which node without reordering the output tree.

use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use crate::element::Element;
use crate::engine::{Fiber, FiberArena, FiberId, UnitKind};
use crate::types::{Key, MutationTag};

/// Child diffing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileStrategy {
    /// Keyed when any incoming sibling carries an explicit key, else positional.
    #[default]
    Auto,
    Positional,
    Keyed,
}

impl ReconcileStrategy {
    /// Strategy actually used for `elements`.
    pub fn resolve(self, elements: &[Element]) -> ReconcileStrategy {
        match self {
            ReconcileStrategy::Auto if elements.iter().any(|e| e.key().is_some()) => ReconcileStrategy::Keyed,
            ReconcileStrategy::Auto => ReconcileStrategy::Positional,
            explicit => explicit,
        }
    }
}

/// Build the next-generation children of `parent` from `elements`.
///
/// The previous children are those of `parent`'s alternate. Superseded ones
/// are tagged [`MutationTag::Remove`] and pushed onto `deletions`.
pub(crate) fn reconcile_children<N: Clone>(
    arena: &mut FiberArena<N>,
    parent: FiberId,
    elements: &[Element],
    strategy: ReconcileStrategy,
    deletions: &mut Vec<FiberId>,
) {
    let old_children = match arena[parent].alternate {
        Some(alternate) => arena.children(alternate),
        None => Vec::new(),
    };

    let children = match strategy.resolve(elements) {
        ReconcileStrategy::Keyed => keyed(arena, &old_children, elements, deletions),
        _ => positional(arena, &old_children, elements, deletions),
    };
    link(arena, parent, &children);
}

fn positional<N: Clone>(
    arena: &mut FiberArena<N>,
    old_children: &[FiberId],
    elements: &[Element],
    deletions: &mut Vec<FiberId>,
) -> Vec<FiberId> {
    let mut children = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let old = old_children.get(index).copied();
        let unit = match old {
            Some(old) if arena[old].kind.matches(element.kind()) => update_unit(arena, old, element),
            _ => {
                if let Some(old) = old {
                    remove_unit(arena, old, deletions);
                }
                create_unit(arena, element)
            }
        };
        children.push(unit);
    }

    for &old in old_children.iter().skip(elements.len()) {
        remove_unit(arena, old, deletions);
    }
    children
}

fn keyed<N: Clone>(
    arena: &mut FiberArena<N>,
    old_children: &[FiberId],
    elements: &[Element],
    deletions: &mut Vec<FiberId>,
) -> Vec<FiberId> {
    let mut lookup: HashMap<Key, FiberId> = HashMap::with_capacity(old_children.len());
    for &old in old_children {
        let key = arena[old].reconcile_key();
        if lookup.contains_key(&key) {
            warn!(%key, "duplicate key among previous children, later unit removed");
            remove_unit(arena, old, deletions);
            continue;
        }
        lookup.insert(key, old);
    }

    let mut seen = HashSet::with_capacity(elements.len());
    let mut children = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let key = match element.key() {
            Some(key) => Key::Explicit(key.clone()),
            None => Key::Index(index),
        };
        if !seen.insert(key.clone()) {
            warn!(%key, "duplicate key among children, only the first occurrence is matched");
        }

        let unit = match lookup.get(&key).copied() {
            Some(old) if arena[old].kind.matches(element.kind()) => {
                lookup.remove(&key);
                update_unit(arena, old, element)
            }
            _ => create_unit(arena, element),
        };
        children.push(unit);
    }

    // Unconsumed entries go away in their previous order
    let remaining: HashSet<FiberId> = lookup.into_values().collect();
    for &old in old_children {
        if remaining.contains(&old) {
            remove_unit(arena, old, deletions);
        }
    }
    children
}

fn create_unit<N>(arena: &mut FiberArena<N>, element: &Element) -> FiberId {
    let mut fiber = Fiber::new(
        UnitKind::Element(element.kind().clone()),
        element.props().clone(),
        element.key().cloned(),
    );
    fiber.tag = MutationTag::Create;
    let id = arena.allocate(fiber);
    trace!(unit = %element.kind().label(), ?id, "create");
    id
}

fn update_unit<N: Clone>(arena: &mut FiberArena<N>, old: FiberId, element: &Element) -> FiberId {
    let mut fiber = Fiber::new(
        UnitKind::Element(element.kind().clone()),
        element.props().clone(),
        element.key().cloned(),
    );
    fiber.node = arena[old].node.clone();
    fiber.alternate = Some(old);
    fiber.tag = MutationTag::Update;
    arena.allocate(fiber)
}

fn remove_unit<N>(arena: &mut FiberArena<N>, old: FiberId, deletions: &mut Vec<FiberId>) {
    trace!(unit = %arena[old].label(), ?old, "remove");
    arena[old].tag = MutationTag::Remove;
    deletions.push(old);
}

/// Rebuild the child and sibling links of `parent`.
fn link<N>(arena: &mut FiberArena<N>, parent: FiberId, children: &[FiberId]) {
    arena[parent].child = children.first().copied();
    for (index, &child) in children.iter().enumerate() {
        let fiber = &mut arena[child];
        fiber.parent = Some(parent);
        fiber.index = index;
        fiber.sibling = children.get(index + 1).copied();
    }
}
