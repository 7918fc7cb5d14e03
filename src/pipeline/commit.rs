//! Commit engine - apply a finished pass to the output tree, then run effects.
//!
//! Two entry points, called back to back by the work loop:
//!
//! 1. [`commit_root`] - mutations, synchronous and complete:
//!    - deletions first: teardown (effect cleanups, `will_unmount`, refs
//!      cleared) then the nodes representing each removed unit are detached
//!      from their nearest host ancestor
//!    - then a depth-first walk of the new tree: CREATE appends the unit's
//!      node to its nearest host ancestor, UPDATE diffs attributes and
//!      listeners against the previous generation
//! 2. [`run_effects`] - after the new tree is promoted: every due cleanup in
//!    the tree runs before the first effect callback, then callbacks and class
//!    `did_mount`/`did_update` run in tree order
//!
//! Failures of cleanups, effects and lifecycle methods are logged, collected
//! and never stop the pass.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use tracing::{error, trace};

use crate::engine::{FiberArena, FiberId, UnitKind};
use crate::element::ElementKind;
use crate::error::EffectError;
use crate::hooks::HookSlot;
use crate::host::Host;
use crate::types::{event_name, AttrValue, Attributes, MutationTag, UnitFlags, REF_ATTRIBUTE, TEXT_VALUE_ATTRIBUTE};

// =============================================================================
// Commit log
// =============================================================================

/// One applied mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub tag: MutationTag,
    /// Unit label (`div`, `#text`, component name)
    pub label: String,
    pub key: Option<Rc<str>>,
}

/// Mutations applied by one commit, in application order.
#[derive(Debug, Clone, Default)]
pub struct CommitLog {
    pub records: Vec<MutationRecord>,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Effect cleanups run while tearing down removed units
    pub cleanups_run: usize,
}

impl CommitLog {
    fn record<N>(&mut self, arena: &FiberArena<N>, unit: FiberId, tag: MutationTag) {
        match tag {
            MutationTag::Create => self.created += 1,
            MutationTag::Update => self.updated += 1,
            MutationTag::Remove => self.removed += 1,
            MutationTag::None => return,
        }
        let fiber = &arena[unit];
        self.records.push(MutationRecord {
            tag,
            label: fiber.label(),
            key: fiber.key.clone(),
        });
    }

    /// Labels of the units that received `tag`, in application order.
    pub fn labels(&self, tag: MutationTag) -> Vec<&str> {
        self.records
            .iter()
            .filter(|record| record.tag == tag)
            .map(|record| record.label.as_str())
            .collect()
    }

    /// Whether the commit created or removed anything.
    pub fn is_structural(&self) -> bool {
        self.created > 0 || self.removed > 0
    }
}

impl fmt::Display for CommitLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            match &record.key {
                Some(key) => writeln!(f, "{} {} key={}", record.tag, record.label, key)?,
                None => writeln!(f, "{} {}", record.tag, record.label)?,
            }
        }
        Ok(())
    }
}

/// Counters of one effects pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EffectStats {
    pub(crate) cleanups_run: usize,
    pub(crate) effects_run: usize,
}

fn report(errors: &mut Vec<EffectError>, unit: &str, stage: &'static str, err: EffectError) {
    error!(unit, stage, error = %err, "effect failed");
    errors.push(err);
}

// =============================================================================
// Mutation phase
// =============================================================================

/// Apply the tags of the tree under `root` and the `deletions` to the host.
pub(crate) fn commit_root<H: Host>(
    host: &mut H,
    arena: &mut FiberArena<H::Node>,
    root: FiberId,
    deletions: &[FiberId],
    errors: &mut Vec<EffectError>,
) -> CommitLog {
    let mut log = CommitLog::default();

    for &unit in deletions {
        if !arena.contains(unit) {
            continue;
        }
        log.cleanups_run += commit_deletion(host, arena, unit, errors);
        log.record(arena, unit, MutationTag::Remove);
        arena[unit].tag = MutationTag::None;
    }

    let mut current = Some(root);
    while let Some(unit) = current {
        let tag = arena[unit].tag;
        let descend = match tag {
            MutationTag::Create => {
                commit_placement(host, arena, unit);
                true
            }
            MutationTag::Update => {
                commit_update(host, arena, unit);
                true
            }
            MutationTag::Remove => false,
            MutationTag::None => true,
        };
        log.record(arena, unit, tag);
        arena[unit].tag = MutationTag::None;
        current = arena.next_preorder(unit, root, descend);
    }
    log
}

fn commit_placement<H: Host>(host: &mut H, arena: &FiberArena<H::Node>, unit: FiberId) {
    let fiber = &arena[unit];
    // Components own no node; their descendants place themselves
    let Some(node) = fiber.node.as_ref() else {
        return;
    };

    if !matches!(fiber.kind, UnitKind::Element(ElementKind::Text)) {
        update_properties(host, node, &Attributes::new(), fiber.props.attributes());
    }
    if let Some(parent) = arena.host_parent(unit).and_then(|parent| arena[parent].node.as_ref()) {
        trace!(unit = %fiber.label(), "append");
        host.append_child(parent, node);
    }
    if let Some(AttrValue::Ref(callback)) = fiber.props.get(REF_ATTRIBUTE) {
        callback.call(Some(node as &dyn Any));
    }
}

fn commit_update<H: Host>(host: &mut H, arena: &FiberArena<H::Node>, unit: FiberId) {
    let fiber = &arena[unit];
    let (Some(node), Some(alternate)) = (fiber.node.as_ref(), fiber.alternate) else {
        return;
    };
    let previous = arena[alternate].props.attributes();
    let next = fiber.props.attributes();

    if matches!(fiber.kind, UnitKind::Element(ElementKind::Text)) {
        let text = next.get(TEXT_VALUE_ATTRIBUTE);
        if previous.get(TEXT_VALUE_ATTRIBUTE) != text {
            let text = text.and_then(AttrValue::as_str).unwrap_or_default();
            host.set_text(node, text);
        }
        return;
    }

    update_properties(host, node, previous, next);

    let old_ref = previous.get(REF_ATTRIBUTE);
    let new_ref = next.get(REF_ATTRIBUTE);
    if old_ref != new_ref {
        if let Some(AttrValue::Ref(callback)) = old_ref {
            callback.call(None);
        }
        if let Some(AttrValue::Ref(callback)) = new_ref {
            callback.call(Some(node as &dyn Any));
        }
    }
}

/// Diff two attribute maps onto `node`: stale entries removed, changed and new
/// entries set, changed listeners rebound. Returns the number of host calls.
pub fn update_properties<H: Host>(host: &mut H, node: &H::Node, previous: &Attributes, next: &Attributes) -> usize {
    let mut calls = 0;

    for (name, old) in previous.iter() {
        if is_reserved(name) {
            continue;
        }
        let new = next.get(name);
        if new == Some(old) {
            continue;
        }
        match old {
            AttrValue::Listener(listener) => {
                host.remove_event_listener(node, &event_name(name), listener);
                calls += 1;
            }
            _ if new.is_none() => {
                host.remove_property(node, name);
                calls += 1;
            }
            _ => {}
        }
    }

    for (name, new) in next.iter() {
        if is_reserved(name) || previous.get(name) == Some(new) {
            continue;
        }
        match new {
            AttrValue::Listener(listener) => host.add_event_listener(node, &event_name(name), listener.clone()),
            AttrValue::Ref(_) => continue,
            value => host.set_property(node, name, value),
        }
        calls += 1;
    }
    calls
}

fn is_reserved(name: &str) -> bool {
    name == REF_ATTRIBUTE || name == TEXT_VALUE_ATTRIBUTE
}

/// Tear down and detach one removed unit. Returns the cleanups run.
fn commit_deletion<H: Host>(
    host: &mut H,
    arena: &FiberArena<H::Node>,
    unit: FiberId,
    errors: &mut Vec<EffectError>,
) -> usize {
    let cleanups = teardown(arena, unit, errors);

    let Some(parent) = arena.host_parent(unit).and_then(|parent| arena[parent].node.clone()) else {
        return cleanups;
    };
    for node in arena.host_nodes(unit) {
        // Already detached nodes (a removed ancestor took them along) are skipped
        if host.contains(&parent, &node) {
            trace!(unit = %arena[unit].label(), "detach");
            host.remove_child(&parent, &node);
        }
    }
    cleanups
}

/// Accept the state drained by the units of the tree under `root`.
pub(crate) fn commit_state<N>(arena: &FiberArena<N>, root: FiberId) {
    let mut current = Some(root);
    while let Some(unit) = current {
        let fiber = &arena[unit];
        if fiber.flags.contains(UnitFlags::STATE_UPDATE) {
            fiber.hooks.iter().for_each(HookSlot::commit_state);
        }
        current = arena.next_preorder(unit, root, fiber.subtree_flags.contains(UnitFlags::STATE_UPDATE));
    }
}

/// Run the unmount work of `unit` and its descendants, skipping subtrees that
/// raised no teardown flag. Returns the effect cleanups run.
pub(crate) fn teardown<N>(arena: &FiberArena<N>, unit: FiberId, errors: &mut Vec<EffectError>) -> usize {
    let mut cleanups = 0;
    let mut current = Some(unit);
    while let Some(id) = current {
        let fiber = &arena[id];
        if fiber.flags.contains(UnitFlags::TEARDOWN) {
            let label = fiber.label();
            for hook in &fiber.hooks {
                if let HookSlot::Effect(cell) = hook {
                    match cell.run_cleanup() {
                        Ok(ran) => cleanups += usize::from(ran),
                        Err(err) => {
                            cleanups += 1;
                            report(errors, &label, "cleanup", err);
                        }
                    }
                }
            }
            if let Some(instance) = &fiber.instance {
                if let Err(err) = instance.borrow_mut().will_unmount() {
                    report(errors, &label, "will_unmount", err);
                }
            }
            if let Some(AttrValue::Ref(callback)) = fiber.props.get(REF_ATTRIBUTE) {
                callback.call(None);
            }
        }
        let descend = fiber.subtree_flags.contains(UnitFlags::TEARDOWN);
        current = arena.next_preorder(id, unit, descend);
    }
    cleanups
}

// =============================================================================
// Effects phase
// =============================================================================

/// Run due cleanups, then due effects and class lifecycle methods, for the
/// committed tree under `root`.
pub(crate) fn run_effects<N>(arena: &FiberArena<N>, root: FiberId, errors: &mut Vec<EffectError>) -> EffectStats {
    let due = UnitFlags::PASSIVE_EFFECT | UnitFlags::LIFECYCLE;
    let mut stats = EffectStats::default();

    let mut jobs = Vec::new();
    let mut current = Some(root);
    while let Some(unit) = current {
        let fiber = &arena[unit];
        if fiber.flags.intersects(due) {
            jobs.push(unit);
        }
        current = arena.next_preorder(unit, root, fiber.subtree_flags.intersects(due));
    }

    for &unit in &jobs {
        let fiber = &arena[unit];
        for hook in &fiber.hooks {
            if let HookSlot::Effect(cell) = hook {
                if cell.is_due() {
                    match cell.run_cleanup() {
                        Ok(ran) => stats.cleanups_run += usize::from(ran),
                        Err(err) => {
                            stats.cleanups_run += 1;
                            report(errors, &fiber.label(), "cleanup", err);
                        }
                    }
                }
            }
        }
    }

    for &unit in &jobs {
        let fiber = &arena[unit];
        for hook in &fiber.hooks {
            if let HookSlot::Effect(cell) = hook {
                if cell.is_due() {
                    stats.effects_run += 1;
                    if let Err(err) = cell.run_effect() {
                        report(errors, &fiber.label(), "effect", err);
                    }
                }
            }
        }
        if fiber.flags.contains(UnitFlags::LIFECYCLE) {
            if let Some(instance) = &fiber.instance {
                let (stage, result) = match fiber.alternate {
                    None => ("did_mount", instance.borrow_mut().did_mount()),
                    Some(_) => ("did_update", instance.borrow_mut().did_update()),
                };
                if let Err(err) = result {
                    report(errors, &fiber.label(), stage, err);
                }
            }
        }
    }
    stats
}
