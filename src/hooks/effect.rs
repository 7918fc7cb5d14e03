//! Effect hook.
//!
//! `use_effect` only records work: the callback is stored on the unit when
//! its deps changed and runs in the effects pass after commit, once every due
//! cleanup of the commit has run. A returned [`Cleanup`] runs before the
//! effect's next execution and on unmount.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::deps::{deps_changed, Deps};
use super::runtime::begin_hook;
use super::HookSlot;
use crate::error::{EffectError, HookError};
use crate::types::UnitFlags;

/// Teardown returned by an effect.
pub struct Cleanup(Box<dyn FnOnce() -> Result<(), EffectError>>);

impl Cleanup {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self(Box::new(move || {
            cleanup();
            Ok(())
        }))
    }

    pub fn fallible(cleanup: impl FnOnce() -> Result<(), EffectError> + 'static) -> Self {
        Self(Box::new(cleanup))
    }

    pub(crate) fn run(self) -> Result<(), EffectError> {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup(..)")
    }
}

/// What an effect callback returns.
pub type EffectResult = Result<Option<Cleanup>, EffectError>;

type EffectFn = Box<dyn FnOnce() -> EffectResult>;

/// Effect record of one generation.
///
/// The cleanup slot is shared with the previous generation's record, so a
/// render that never commits cannot lose a cleanup.
pub(crate) struct EffectCell {
    deps: Option<Deps>,
    pending: RefCell<Option<EffectFn>>,
    cleanup: Rc<RefCell<Option<Cleanup>>>,
}

impl EffectCell {
    /// Callback scheduled for this commit and not yet run.
    pub(crate) fn is_due(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Run and forget the stored cleanup. `Ok(false)` when there was none.
    pub(crate) fn run_cleanup(&self) -> Result<bool, EffectError> {
        let cleanup = self.cleanup.borrow_mut().take();
        match cleanup {
            Some(cleanup) => cleanup.run().map(|()| true),
            None => Ok(false),
        }
    }

    pub(crate) fn run_effect(&self) -> Result<(), EffectError> {
        let effect = self.pending.borrow_mut().take();
        let Some(effect) = effect else {
            return Ok(());
        };
        let cleanup = effect()?;
        *self.cleanup.borrow_mut() = cleanup;
        Ok(())
    }
}

/// Run `effect` after commit when `deps` changed since the last committed
/// render. `None` deps run it after every commit; an empty list only after
/// mount.
pub fn use_effect<F>(effect: F, deps: Option<Deps>) -> Result<(), HookError>
where
    F: FnOnce() -> EffectResult + 'static,
{
    let mut cursor = begin_hook("use_effect")?;
    let previous = match cursor.take_previous() {
        None => None,
        Some(HookSlot::Effect(cell)) => Some(cell),
        Some(other) => return Err(cursor.mismatch(other.name())),
    };

    let due = match &previous {
        None => true,
        Some(previous) => deps_changed(previous.deps.as_ref(), deps.as_ref()),
    };
    let cleanup = previous.map(|previous| previous.cleanup.clone()).unwrap_or_default();
    let pending: Option<EffectFn> = if due { Some(Box::new(effect)) } else { None };

    cursor.mark(if due {
        UnitFlags::PASSIVE_EFFECT | UnitFlags::TEARDOWN
    } else {
        UnitFlags::TEARDOWN
    });
    cursor.finish(HookSlot::Effect(Rc::new(EffectCell {
        deps,
        pending: RefCell::new(pending),
        cleanup,
    })));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Weak;

    use super::*;
    use crate::deps;
    use crate::engine::FiberId;
    use crate::hooks::{render_with_hooks, RenderFrame};

    fn render(previous: Vec<HookSlot>, body: impl FnOnce()) -> (Vec<HookSlot>, UnitFlags) {
        let frame = RenderFrame::new(FiberId(0), "Test", previous, Vec::new(), Weak::new());
        let (_, hooks, flags) = render_with_hooks(frame, body);
        (hooks, flags)
    }

    fn cell(hooks: &[HookSlot]) -> Rc<EffectCell> {
        match &hooks[0] {
            HookSlot::Effect(cell) => cell.clone(),
            other => panic!("expected effect record, found {}", other.name()),
        }
    }

    #[test]
    fn test_effect_due_on_mount_and_on_dep_change() {
        let (hooks, flags) = render(Vec::new(), || use_effect(|| Ok(None), Some(deps![1])).unwrap());
        assert!(flags.contains(UnitFlags::PASSIVE_EFFECT | UnitFlags::TEARDOWN));
        assert!(cell(&hooks).is_due());
        cell(&hooks).run_effect().unwrap();

        let (hooks, flags) = render(hooks, || use_effect(|| Ok(None), Some(deps![1])).unwrap());
        assert_eq!(flags, UnitFlags::TEARDOWN);
        assert!(!cell(&hooks).is_due());

        let (hooks, flags) = render(hooks, || use_effect(|| Ok(None), Some(deps![2])).unwrap());
        assert!(flags.contains(UnitFlags::PASSIVE_EFFECT));
        assert!(cell(&hooks).is_due());
    }

    #[test]
    fn test_cleanup_carries_over_to_next_generation() {
        let cleaned = Rc::new(Cell::new(0));
        let counter = cleaned.clone();
        let (hooks, _) = render(Vec::new(), move || {
            use_effect(move || Ok(Some(Cleanup::new(move || counter.set(counter.get() + 1)))), None).unwrap()
        });
        cell(&hooks).run_effect().unwrap();

        let (hooks, _) = render(hooks, || use_effect(|| Ok(None), None).unwrap());
        assert_eq!(cell(&hooks).run_cleanup(), Ok(true));
        assert_eq!(cleaned.get(), 1);

        // Cleanup runs at most once
        assert_eq!(cell(&hooks).run_cleanup(), Ok(false));
        assert_eq!(cleaned.get(), 1);
    }

    #[test]
    fn test_failing_effect_reports_error() {
        let (hooks, _) = render(Vec::new(), || use_effect(|| Err("boom".into()), None).unwrap());
        assert_eq!(cell(&hooks).run_effect(), Err(EffectError::new("boom")));
        assert!(!cell(&hooks).is_due());
    }
}
