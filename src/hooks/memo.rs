//! Memoisation hooks.

use std::any::Any;
use std::rc::Rc;

use super::deps::{deps_changed, Deps};
use super::runtime::begin_hook;
use super::HookSlot;
use crate::error::HookError;

struct MemoCell<T> {
    value: T,
    deps: Option<Deps>,
}

/// Cached `compute()` result, recomputed only when `deps` changed.
pub fn use_memo<T, F>(compute: F, deps: Option<Deps>) -> Result<T, HookError>
where
    T: Clone + 'static,
    F: FnOnce() -> T,
{
    memo_hook("use_memo", compute, deps)
}

/// Stable callback identity: returns the same `Rc` until `deps` change.
pub fn use_callback<F: 'static>(callback: F, deps: Option<Deps>) -> Result<Rc<F>, HookError> {
    memo_hook("use_callback", move || Rc::new(callback), deps)
}

fn memo_hook<T, F>(hook: &'static str, compute: F, deps: Option<Deps>) -> Result<T, HookError>
where
    T: Clone + 'static,
    F: FnOnce() -> T,
{
    let mut cursor = begin_hook(hook)?;
    let previous = match cursor.take_previous() {
        None => None,
        Some(HookSlot::Memo(any)) => Some(
            any.downcast::<MemoCell<T>>()
                .map_err(|_| cursor.mismatch("memo of another type"))?,
        ),
        Some(other) => return Err(cursor.mismatch(other.name())),
    };

    let cell = match previous {
        Some(previous) if !deps_changed(previous.deps.as_ref(), deps.as_ref()) => previous,
        _ => Rc::new(MemoCell {
            value: compute(),
            deps,
        }),
    };
    let value = cell.value.clone();
    let slot: Rc<dyn Any> = cell;
    cursor.finish(HookSlot::Memo(slot));
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Weak;

    use super::*;
    use crate::deps;
    use crate::engine::FiberId;
    use crate::hooks::{render_with_hooks, RenderFrame};

    fn render<R>(hooks: &mut Vec<HookSlot>, body: impl FnOnce() -> R) -> R {
        let frame = RenderFrame::new(FiberId(0), "Test", std::mem::take(hooks), Vec::new(), Weak::new());
        let (result, next, _) = render_with_hooks(frame, body);
        *hooks = next;
        result
    }

    #[test]
    fn test_memo_recomputes_on_dep_change_only() {
        let runs = Cell::new(0);
        let mut hooks = Vec::new();
        let compute = |n: i32| {
            runs.set(runs.get() + 1);
            n * 2
        };

        assert_eq!(render(&mut hooks, || use_memo(|| compute(1), Some(deps![1])).unwrap()), 2);
        assert_eq!(render(&mut hooks, || use_memo(|| compute(1), Some(deps![1])).unwrap()), 2);
        assert_eq!(runs.get(), 1);

        assert_eq!(render(&mut hooks, || use_memo(|| compute(4), Some(deps![4])).unwrap()), 8);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_memo_without_deps_always_recomputes() {
        let runs = Cell::new(0);
        let mut hooks = Vec::new();
        for _ in 0..3 {
            render(&mut hooks, || use_memo(|| runs.set(runs.get() + 1), None).unwrap());
        }
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_callback_identity_is_stable() {
        fn increment(hooks: &mut Vec<HookSlot>) -> Rc<impl Fn(i32) -> i32 + use<>> {
            render(hooks, || use_callback(|x: i32| x + 1, Some(deps![])).unwrap())
        }

        let mut hooks = Vec::new();
        let first = increment(&mut hooks);
        let second = increment(&mut hooks);
        assert_eq!(second(1), 2);
        assert!(Rc::ptr_eq(&first, &second));
    }
}
