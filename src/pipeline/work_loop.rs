//! Work loop - incremental render passes, commit sequencing, re-entrancy.
//!
//! ```text
//!          request                 no units left
//!  Idle ───────────► Rendering ───────────────────► Committing ──► Effects
//!   ▲                 │    ▲                                         │
//!   │                 └────┘ one unit, then ask the deadline         │
//!   └──────────────── nothing pending ◄──────────────────────────────┤
//!                     pending again ──► Rendering (new cycle) ◄──────┘
//! ```
//!
//! A render pass walks the work-in-progress tree depth-first: process a unit
//! (run the component or create the host node, then reconcile its children),
//! descend to its first child, otherwise climb to the nearest ancestor
//! sibling. The only suspension point is between two units. Commit and
//! effects always run to completion.
//!
//! Requests coalesce: any number of state updates before the next `work` call
//! yield one pass. A request that arrives while a pass is suspended replaces
//! the in-flight tree with a fresh one.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::commit;
use super::mount::Root;
use super::reconcile::reconcile_children;
use crate::element::{ClassType, Element, ElementKind, FunctionComponent};
use crate::engine::{Fiber, FiberId, UnitKind};
use crate::error::RenderError;
use crate::hooks::{render_with_hooks, ContextValues, RenderFrame};
use crate::host::Host;
use crate::types::{AttrValue, MutationTag, Props, UnitFlags, PROVIDER_VALUE_ATTRIBUTE, REF_ATTRIBUTE, TEXT_VALUE_ATTRIBUTE};

// =============================================================================
// Scheduler
// =============================================================================

/// Render-request flag shared by a root and everything that can ask it to
/// render (state dispatchers, class updaters).
#[derive(Default)]
pub(crate) struct SchedulerShared {
    pending: Cell<bool>,
    waker: RefCell<Option<Rc<dyn Fn()>>>,
}

impl SchedulerShared {
    /// Raise the flag. The waker fires once per coalesced request.
    pub(crate) fn request(&self) {
        if self.pending.replace(true) {
            return;
        }
        let waker = self.waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.get()
    }

    pub(crate) fn take_pending(&self) -> bool {
        self.pending.replace(false)
    }

    pub(crate) fn set_waker(&self, waker: Option<Rc<dyn Fn()>>) {
        *self.waker.borrow_mut() = waker;
    }
}

/// Ask the root behind `scheduler` for a render, if it still exists.
pub(crate) fn schedule_render(scheduler: &Weak<SchedulerShared>, source: &'static str) {
    match scheduler.upgrade() {
        Some(scheduler) => scheduler.request(),
        None => warn!(source, "render requested for a root that no longer exists, ignored"),
    }
}

/// Handle a class component uses to request a re-render.
#[derive(Clone)]
pub struct Updater {
    scheduler: Weak<SchedulerShared>,
}

impl Updater {
    pub(crate) fn new(scheduler: Weak<SchedulerShared>) -> Self {
        Self { scheduler }
    }

    /// Queue a render of the owning root.
    pub fn schedule_render(&self) {
        schedule_render(&self.scheduler, "class update");
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("attached", &(self.scheduler.strong_count() > 0))
            .finish()
    }
}

/// Where a root is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Rendering,
    Committing,
    Effects,
}

/// Outcome of one [`Root::work`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing left to do.
    Idle,
    /// The deadline expired with work remaining; call `work` again.
    Yielded,
}

// =============================================================================
// Deadlines
// =============================================================================

/// Budget consulted after every processed unit.
pub trait Deadline {
    fn should_yield(&mut self) -> bool;
}

/// Yield once a wall-clock slice has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct TimeSlice {
    end: Instant,
}

impl TimeSlice {
    pub fn new(budget: Duration) -> Self {
        Self {
            end: Instant::now() + budget,
        }
    }
}

impl Deadline for TimeSlice {
    fn should_yield(&mut self) -> bool {
        Instant::now() >= self.end
    }
}

/// Yield after a fixed number of units. At least one unit is always processed.
#[derive(Debug, Clone, Copy)]
pub struct UnitBudget {
    remaining: usize,
}

impl UnitBudget {
    pub fn new(units: usize) -> Self {
        Self { remaining: units }
    }
}

impl Deadline for UnitBudget {
    fn should_yield(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }
}

/// Never yield.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn should_yield(&mut self) -> bool {
        false
    }
}

// =============================================================================
// Work-in-progress state
// =============================================================================

/// Render pass in flight.
pub(crate) struct WorkInProgress {
    pub(crate) root: FiberId,
    pub(crate) next: Option<FiberId>,
    pub(crate) deletions: Vec<FiberId>,
}

// =============================================================================
// Driving the loop
// =============================================================================

impl<H: Host> Root<H> {
    /// Process work until done or until `deadline` asks to yield.
    ///
    /// A completed pass is committed and its effects run in the same call;
    /// when effects request another render the loop continues with a new pass.
    /// A failing component aborts the pass: the in-flight tree is discarded,
    /// the committed output stays untouched, and the error is returned.
    pub fn work(&mut self, deadline: &mut dyn Deadline) -> Result<WorkStatus, RenderError> {
        let mut cycles = 0;
        loop {
            if self.scheduler.take_pending() {
                self.begin_render();
            }
            let Some(root) = self.wip.as_ref().map(|wip| wip.root) else {
                self.phase = Phase::Idle;
                return Ok(WorkStatus::Idle);
            };

            self.phase = Phase::Rendering;
            while let Some(unit) = self.wip.as_ref().and_then(|wip| wip.next) {
                if let Err(err) = self.perform_unit(unit) {
                    warn!(unit = %self.arena[unit].label(), error = %err, "render pass aborted");
                    self.discard_work();
                    self.phase = Phase::Idle;
                    return Err(err);
                }
                self.stats.units += 1;

                let next = self.advance(unit, root);
                if let Some(wip) = self.wip.as_mut() {
                    wip.next = next;
                }
                if next.is_some() && deadline.should_yield() {
                    self.stats.yields += 1;
                    trace!(units = self.stats.units, "yielding to host");
                    return Ok(WorkStatus::Yielded);
                }
            }

            if let Some(wip) = self.wip.take() {
                self.finish_cycle(wip);
            }
            cycles += 1;

            if !self.scheduler.is_pending() {
                self.phase = Phase::Idle;
                return Ok(WorkStatus::Idle);
            }
            if cycles >= self.config.max_render_cycles {
                self.scheduler.take_pending();
                self.phase = Phase::Idle;
                warn!(cycles, "render requests keep arriving from effects, giving up");
                return Err(RenderError::UpdateDepthExceeded {
                    limit: self.config.max_render_cycles,
                });
            }
            if deadline.should_yield() {
                self.stats.yields += 1;
                return Ok(WorkStatus::Yielded);
            }
        }
    }

    /// Run all pending work to completion.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        self.work(&mut Unbounded).map(|_| ())
    }

    /// Run for at most one configured time slice.
    pub fn work_slice(&mut self) -> Result<WorkStatus, RenderError> {
        let mut deadline = TimeSlice::new(self.config.time_slice);
        self.work(&mut deadline)
    }

    /// Whether a render pass is in flight or requested.
    pub fn has_pending_work(&self) -> bool {
        self.wip.is_some() || self.scheduler.is_pending()
    }

    /// Start a fresh work-in-progress tree, replacing any in-flight one.
    fn begin_render(&mut self) {
        let Some(container) = self.container.clone() else {
            warn!("render requested before a container was bound, ignored");
            return;
        };
        if self.wip.is_some() {
            debug!("restarting render pass for a newer request");
            self.stats.restarts += 1;
            self.discard_work();
        }

        let mut fiber = Fiber::new(UnitKind::Root, Props::from_children(self.elements.clone()), None);
        fiber.node = Some(container);
        fiber.alternate = self.current;
        let root = self.arena.allocate(fiber);

        self.stats.renders += 1;
        debug!(render = self.stats.renders, "render pass started");
        self.wip = Some(WorkInProgress {
            root,
            next: Some(root),
            deletions: Vec::new(),
        });
    }

    /// Drop the in-flight tree, leaving the committed one as it was.
    pub(crate) fn discard_work(&mut self) {
        let Some(wip) = self.wip.take() else {
            return;
        };
        for unit in wip.deletions {
            if let Some(fiber) = self.arena.get_mut(unit) {
                fiber.tag = MutationTag::None;
            }
        }
        for unit in self.arena.subtree(wip.root) {
            let fiber = &self.arena[unit];
            if fiber.flags.contains(UnitFlags::STATE_UPDATE) {
                fiber.hooks.iter().for_each(|hook| hook.rollback_state());
            }
        }
        self.arena.release_subtree(wip.root);
    }

    /// Next unit in render order, completing every unit left behind.
    fn advance(&mut self, unit: FiberId, root: FiberId) -> Option<FiberId> {
        if let Some(child) = self.arena[unit].child {
            return Some(child);
        }
        let mut current = unit;
        loop {
            self.arena.complete(current);
            if current == root {
                return None;
            }
            if let Some(sibling) = self.arena[current].sibling {
                return Some(sibling);
            }
            current = self.arena[current].parent?;
        }
    }

    // =========================================================================
    // Processing one unit
    // =========================================================================

    fn perform_unit(&mut self, unit: FiberId) -> Result<(), RenderError> {
        let kind = self.arena[unit].kind.clone();
        trace!(unit = %kind.label(), "perform unit");

        let children: Rc<[Element]> = match &kind {
            UnitKind::Root | UnitKind::Element(ElementKind::Provider(_)) => {
                self.arena[unit].props.shared_children()
            }
            UnitKind::Element(ElementKind::Host(tag)) => {
                if self.arena[unit].node.is_none() {
                    let node = self.host.create_element(tag);
                    self.arena[unit].node = Some(node);
                }
                let fiber = &mut self.arena[unit];
                if fiber.props.get(REF_ATTRIBUTE).is_some() {
                    fiber.flags |= UnitFlags::TEARDOWN;
                }
                fiber.props.shared_children()
            }
            UnitKind::Element(ElementKind::Text) => {
                if self.arena[unit].node.is_none() {
                    let text = self.arena[unit].props.str(TEXT_VALUE_ATTRIBUTE).unwrap_or_default().to_string();
                    let node = self.host.create_text(&text);
                    self.arena[unit].node = Some(node);
                }
                Rc::from(Vec::new())
            }
            UnitKind::Element(ElementKind::Function(component)) => self.render_function(unit, component)?.into(),
            UnitKind::Element(ElementKind::Class(class)) => self.render_class(unit, class)?.into(),
        };

        let strategy = self.config.reconcile;
        let deletions = match self.wip.as_mut() {
            Some(wip) => &mut wip.deletions,
            None => return Ok(()),
        };
        reconcile_children(&mut self.arena, unit, &children, strategy, deletions);
        Ok(())
    }

    fn render_function(&mut self, unit: FiberId, component: &FunctionComponent) -> Result<Vec<Element>, RenderError> {
        let previous = match self.arena[unit].alternate {
            Some(alternate) => self.arena[alternate].hooks.clone(),
            None => Vec::new(),
        };
        let props = self.arena[unit].props.clone();
        let frame = RenderFrame::new(
            unit,
            component.name(),
            previous,
            self.collect_contexts(unit),
            Rc::downgrade(&self.scheduler),
        );

        let (rendered, hooks, flags) = render_with_hooks(frame, || component.call(&props));
        let fiber = &mut self.arena[unit];
        fiber.hooks = hooks;
        fiber.flags |= flags;

        let child = rendered.map_err(|err| name_component(err, component.name()))?;
        Ok(child.into_elements())
    }

    fn render_class(&mut self, unit: FiberId, class: &ClassType) -> Result<Vec<Element>, RenderError> {
        let props = self.arena[unit].props.clone();
        let retained = self.arena[unit]
            .alternate
            .and_then(|alternate| self.arena[alternate].instance.clone());
        let instance = match retained {
            Some(instance) => instance,
            None => class.construct(&props, Updater::new(Rc::downgrade(&self.scheduler))),
        };

        let rendered = {
            let mut component = instance.borrow_mut();
            component.set_props(&props);
            component.render()
        };
        let fiber = &mut self.arena[unit];
        fiber.instance = Some(instance);
        fiber.flags |= UnitFlags::LIFECYCLE | UnitFlags::TEARDOWN;

        let child = rendered.map_err(|err| name_component(err, class.name()))?;
        Ok(child.into_elements())
    }

    /// Provider values above `unit`, nearest first.
    fn collect_contexts(&self, unit: FiberId) -> ContextValues {
        let mut contexts = Vec::new();
        let mut current = self.arena[unit].parent;
        while let Some(ancestor) = current {
            let fiber = &self.arena[ancestor];
            if let UnitKind::Element(ElementKind::Provider(id)) = &fiber.kind {
                let value = match fiber.props.get(PROVIDER_VALUE_ATTRIBUTE) {
                    Some(AttrValue::Any(value)) => Some(value.clone()),
                    _ => None,
                };
                contexts.push((*id, value));
            }
            current = fiber.parent;
        }
        contexts
    }

    /// Commit a finished pass, promote it, run its effects, retire the old tree.
    fn finish_cycle(&mut self, wip: WorkInProgress) {
        self.phase = Phase::Committing;
        let log = commit::commit_root(&mut self.host, &mut self.arena, wip.root, &wip.deletions, &mut self.effect_errors);
        commit::commit_state(&self.arena, wip.root);
        let previous = self.current.replace(wip.root);
        self.stats.commits += 1;

        self.phase = Phase::Effects;
        let effects = commit::run_effects(&self.arena, wip.root, &mut self.effect_errors);
        self.stats.effects_run += effects.effects_run;
        self.stats.cleanups_run += effects.cleanups_run + log.cleanups_run;

        if let Some(previous) = previous {
            self.arena.release_subtree(previous);
        }
        self.arena.clear_alternates(wip.root);

        debug!(
            created = log.created,
            updated = log.updated,
            removed = log.removed,
            effects = effects.effects_run,
            units = self.arena.len(),
            "commit finished"
        );
        self.last_commit = Some(log);
    }
}

/// Attach the component name to failures raised through `RenderError::msg`.
fn name_component(err: RenderError, name: &str) -> RenderError {
    match err {
        RenderError::Component { component, message } if component == "unknown" => RenderError::Component {
            component: name.to_string(),
            message,
        },
        other => other,
    }
}
