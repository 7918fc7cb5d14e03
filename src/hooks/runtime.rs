//! Hook runtime - the render frame every hook reads and writes.
//!
//! While the work loop invokes a function component it pushes a
//! [`RenderFrame`] for that unit onto a thread-local stack (the same
//! push/pop discipline the parent-context stack uses) and pops it when the
//! body returns, even on panic. Hooks reach the frame through
//! [`begin_hook`], which:
//! 1. fails with [`HookError::OutsideRender`] when no frame is active
//! 2. reserves the next position in call order
//! 3. hands back the previous generation's record at that position
//!
//! A hook call that fails before storing its record still keeps its
//! position: the previous generation's record is carried over (or the slot is
//! left vacant) so the hooks after it keep their records.
//!
//! Do not call hooks from initialisers, memo computations or effect
//! callbacks. Those run conditionally, so a hook inside them shifts every
//! later position on the renders where they are skipped.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::context::ContextId;
use super::HookSlot;
use crate::engine::FiberId;
use crate::error::HookError;
use crate::pipeline::SchedulerShared;
use crate::types::UnitFlags;

/// Provider values visible to a unit, nearest ancestor first. `None` marks a
/// provider that carries no usable value.
pub(crate) type ContextValues = Vec<(ContextId, Option<Rc<dyn Any>>)>;

/// Per-invocation hook state of one function component.
pub(crate) struct RenderFrame {
    unit: FiberId,
    component: &'static str,
    previous: Vec<HookSlot>,
    hooks: Vec<Option<HookSlot>>,
    contexts: ContextValues,
    scheduler: Weak<SchedulerShared>,
    flags: UnitFlags,
}

impl RenderFrame {
    pub(crate) fn new(
        unit: FiberId,
        component: &'static str,
        previous: Vec<HookSlot>,
        contexts: ContextValues,
        scheduler: Weak<SchedulerShared>,
    ) -> Self {
        Self {
            unit,
            component,
            previous,
            hooks: Vec::new(),
            contexts,
            scheduler,
            flags: UnitFlags::NONE,
        }
    }

    fn into_parts(self) -> (Vec<HookSlot>, UnitFlags) {
        let mut previous = self.previous.into_iter();
        let hooks = self
            .hooks
            .into_iter()
            .map(|slot| {
                let carried = previous.next();
                slot.or(carried).unwrap_or(HookSlot::Vacant)
            })
            .collect();
        (hooks, self.flags)
    }
}

thread_local! {
    /// Frames of the component invocations in progress (innermost last).
    static FRAMES: RefCell<Vec<RenderFrame>> = const { RefCell::new(Vec::new()) };
}

/// Pops the frame if the component body unwinds.
struct FrameGuard {
    armed: bool,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if self.armed {
            FRAMES.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }
}

/// Run `render` with `frame` as the current unit.
///
/// Returns the render result together with the hook records built during the
/// call and the flags the hooks raised.
pub(crate) fn render_with_hooks<R>(
    frame: RenderFrame,
    render: impl FnOnce() -> R,
) -> (R, Vec<HookSlot>, UnitFlags) {
    FRAMES.with(|frames| frames.borrow_mut().push(frame));
    let mut guard = FrameGuard { armed: true };

    let result = render();

    guard.armed = false;
    let (hooks, flags) = FRAMES
        .with(|frames| frames.borrow_mut().pop())
        .map(RenderFrame::into_parts)
        .unwrap_or_default();
    (result, hooks, flags)
}

/// Unit whose component body is currently running, if any.
pub fn current_unit() -> Option<FiberId> {
    FRAMES.with(|frames| frames.borrow().last().map(|frame| frame.unit))
}

/// Name of the component currently rendering, if any.
pub fn current_component() -> Option<&'static str> {
    FRAMES.with(|frames| frames.borrow().last().map(|frame| frame.component))
}

/// Reserve the next hook position of the current unit.
pub(crate) fn begin_hook(hook: &'static str) -> Result<HookCursor, HookError> {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let frame = frames.last_mut().ok_or(HookError::OutsideRender { hook })?;
        let index = frame.hooks.len();
        frame.hooks.push(None);
        Ok(HookCursor {
            hook,
            index,
            previous: frame
                .previous
                .get(index)
                .filter(|slot| !matches!(slot, HookSlot::Vacant))
                .cloned(),
            scheduler: frame.scheduler.clone(),
        })
    })
}

/// One reserved hook position: read the previous record, then [`finish`](HookCursor::finish)
/// with this generation's record.
pub(crate) struct HookCursor {
    hook: &'static str,
    index: usize,
    previous: Option<HookSlot>,
    scheduler: Weak<SchedulerShared>,
}

impl HookCursor {
    /// Record stored at this position by the previous generation.
    pub(crate) fn take_previous(&mut self) -> Option<HookSlot> {
        self.previous.take()
    }

    pub(crate) fn scheduler(&self) -> Weak<SchedulerShared> {
        self.scheduler.clone()
    }

    pub(crate) fn mismatch(&self, found: &'static str) -> HookError {
        HookError::OrderMismatch {
            hook: self.hook,
            index: self.index,
            found,
        }
    }

    /// Raise flags on the current unit.
    pub(crate) fn mark(&self, flags: UnitFlags) {
        FRAMES.with(|frames| {
            if let Some(frame) = frames.borrow_mut().last_mut() {
                frame.flags |= flags;
            }
        });
    }

    /// Value of the nearest provider for `id`: `None` when no ancestor
    /// provides it, `Some(None)` when the provider is malformed.
    pub(crate) fn context(&self, id: ContextId) -> Option<Option<Rc<dyn Any>>> {
        FRAMES.with(|frames| {
            frames.borrow().last().and_then(|frame| {
                frame
                    .contexts
                    .iter()
                    .find(|(provided, _)| *provided == id)
                    .map(|(_, value)| value.clone())
            })
        })
    }

    /// Store this generation's record at the reserved position.
    pub(crate) fn finish(self, slot: HookSlot) {
        FRAMES.with(|frames| {
            if let Some(entry) = frames
                .borrow_mut()
                .last_mut()
                .and_then(|frame| frame.hooks.get_mut(self.index))
            {
                *entry = Some(slot);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{use_ref, use_state};

    fn frame(previous: Vec<HookSlot>) -> RenderFrame {
        RenderFrame::new(FiberId(0), "Probe", previous, Vec::new(), Weak::new())
    }

    #[test]
    fn test_hook_outside_render_fails() {
        let err = use_state(|| 0).unwrap_err();
        assert_eq!(err, HookError::OutsideRender { hook: "use_state" });
        assert!(current_unit().is_none());
    }

    #[test]
    fn test_frame_collects_hooks_in_order() {
        let (result, hooks, _) = render_with_hooks(frame(Vec::new()), || {
            assert_eq!(current_unit(), Some(FiberId(0)));
            assert_eq!(current_component(), Some("Probe"));
            use_state(|| 1)?;
            use_ref(|| "r")?;
            Ok::<_, HookError>(())
        });
        assert!(result.is_ok());
        assert_eq!(hooks.iter().map(HookSlot::name).collect::<Vec<_>>(), vec!["state", "ref"]);
        assert!(current_unit().is_none());
    }

    #[test]
    fn test_previous_records_are_positional() {
        let (_, first, _) = render_with_hooks(frame(Vec::new()), || {
            let counter = use_ref(|| 0u32).unwrap();
            *counter.borrow_mut() += 1;
        });
        let (count, _, _) = render_with_hooks(frame(first), || {
            let counter = use_ref(|| 0u32).unwrap();
            *counter.borrow_mut() += 1;
            counter.get()
        });
        assert_eq!(count, 2);
    }

    #[test]
    fn test_reordered_hooks_report_mismatch() {
        let (_, first, _) = render_with_hooks(frame(Vec::new()), || {
            use_state(|| 0).unwrap();
        });
        let (result, _, _) = render_with_hooks(frame(first), || use_ref(|| 0).map(|_| ()));
        assert_eq!(
            result.unwrap_err(),
            HookError::OrderMismatch { hook: "use_ref", index: 0, found: "state" }
        );
    }

    #[test]
    fn test_frame_popped_after_panic() {
        let outcome = std::panic::catch_unwind(|| {
            render_with_hooks(frame(Vec::new()), || panic!("component exploded"));
        });
        assert!(outcome.is_err());
        assert!(current_unit().is_none());
    }

    #[test]
    fn test_failed_hook_keeps_its_position() {
        let failing = || use_state(|| 0u8).map(|_| ()).unwrap_or(());
        let (_, first, _) = render_with_hooks(frame(Vec::new()), || {
            let _ = use_ref(|| 0u32).unwrap();
            use_ref(|| 7u32).unwrap()
        });
        // Position 0 now fails with a mismatch; position 1 still finds its ref
        let (seven, second, _) = render_with_hooks(frame(first), || {
            failing();
            use_ref(|| 0u32).unwrap().get()
        });
        assert_eq!(seven, 7);
        assert_eq!(second.iter().map(HookSlot::name).collect::<Vec<_>>(), vec!["ref", "ref"]);
    }

    #[test]
    fn test_vacant_slot_reads_as_fresh() {
        let (value, second, _) = render_with_hooks(frame(vec![HookSlot::Vacant]), || {
            use_ref(|| 1u32).unwrap().get()
        });
        assert_eq!(value, 1);
        assert_eq!(second.iter().map(HookSlot::name).collect::<Vec<_>>(), vec!["ref"]);
    }
}
