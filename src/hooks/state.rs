//! State hooks: `use_reducer` and `use_state` on top of it.
//!
//! The state cell is shared by every generation of the unit. Dispatching
//! appends to the cell's queue and asks the scheduler for a render; the
//! queue is drained, in dispatch order, the next time the component reads the
//! hook. An action dispatched into an empty queue is reduced immediately, and
//! when the result equals the current state no render is requested.
//!
//! A drained value only becomes the committed one when its render pass
//! commits. A pass that is abandoned puts its drained result back at the head
//! of the queue, so the next pass (and the bail-out check) starts from what
//! the output actually shows.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::runtime::begin_hook;
use super::HookSlot;
use crate::error::HookError;
use crate::pipeline::{schedule_render, SchedulerShared};
use crate::types::UnitFlags;

type Reducer<S, A> = Rc<dyn Fn(&S, A) -> S>;

enum Update<S, A> {
    Action(A),
    /// Already reduced when it was dispatched
    Eager(S),
}

/// State record as seen by the commit engine.
pub(crate) trait StateRecord {
    /// Make the value drained by the last render the committed one.
    fn commit(&self);
    /// Undo the drain of a render that will never commit.
    fn rollback(&self);
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

pub(crate) struct ReducerCell<S, A> {
    /// Latest drained value
    state: RefCell<S>,
    /// Value of the last committed render
    committed: RefCell<S>,
    queue: RefCell<VecDeque<Update<S, A>>>,
    reducer: RefCell<Reducer<S, A>>,
}

impl<S: Clone, A> ReducerCell<S, A> {
    fn new(state: S, reducer: Reducer<S, A>) -> Self {
        Self {
            committed: RefCell::new(state.clone()),
            state: RefCell::new(state),
            queue: RefCell::new(VecDeque::new()),
            reducer: RefCell::new(reducer),
        }
    }

    /// Apply queued updates with the latest reducer and return the result.
    /// `None` when nothing was queued.
    fn drain(&self) -> Option<S> {
        let pending: Vec<_> = self.queue.borrow_mut().drain(..).collect();
        if pending.is_empty() {
            return None;
        }

        let reducer = self.reducer.borrow().clone();
        let mut next = self.state.borrow().clone();
        for update in pending {
            next = match update {
                Update::Eager(state) => state,
                Update::Action(action) => reducer(&next, action),
            };
        }
        *self.state.borrow_mut() = next.clone();
        Some(next)
    }
}

impl<S: Clone + PartialEq + 'static, A: 'static> StateRecord for ReducerCell<S, A> {
    fn commit(&self) {
        let state = self.state.borrow().clone();
        *self.committed.borrow_mut() = state;
    }

    fn rollback(&self) {
        let committed = self.committed.borrow().clone();
        let drained = self.state.replace(committed.clone());
        if drained != committed {
            self.queue.borrow_mut().push_front(Update::Eager(drained));
        }
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Dispatch function returned by [`use_reducer`].
///
/// Stable across renders: every generation hands out a dispatcher for the same
/// state cell. Dispatching after the component unmounted is ignored.
pub struct Dispatch<S, A> {
    cell: Weak<ReducerCell<S, A>>,
    scheduler: Weak<SchedulerShared>,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<S, A> fmt::Debug for Dispatch<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dispatch({:p})", self.cell.as_ptr())
    }
}

impl<S: Clone + PartialEq + 'static, A: 'static> Dispatch<S, A> {
    pub fn dispatch(&self, action: A) {
        let Some(cell) = self.cell.upgrade() else {
            warn!("state update on an unmounted component ignored");
            return;
        };

        let update = if cell.queue.borrow().is_empty() {
            let reducer = cell.reducer.borrow().clone();
            let current = cell.state.borrow().clone();
            let next = reducer(&current, action);
            if next == current {
                trace!("state unchanged, render skipped");
                return;
            }
            Update::Eager(next)
        } else {
            Update::Action(action)
        };

        cell.queue.borrow_mut().push_back(update);
        schedule_render(&self.scheduler, "state update");
    }

    /// Whether both dispatchers drive the same state cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.cell, &other.cell)
    }
}

/// Reducer-based state.
///
/// `init` runs on mount only. Returns the current state (with every queued
/// action applied) and the dispatcher.
pub fn use_reducer<S, A, R>(reducer: R, init: impl FnOnce() -> S) -> Result<(S, Dispatch<S, A>), HookError>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
    R: Fn(&S, A) -> S + 'static,
{
    let reducer: Reducer<S, A> = Rc::new(reducer);
    reducer_hook("use_reducer", reducer, init)
}

fn reducer_hook<S, A>(
    hook: &'static str,
    reducer: Reducer<S, A>,
    init: impl FnOnce() -> S,
) -> Result<(S, Dispatch<S, A>), HookError>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    let mut cursor = begin_hook(hook)?;
    let cell = match cursor.take_previous() {
        None => Rc::new(ReducerCell::new(init(), reducer.clone())),
        Some(HookSlot::State(record)) => record
            .into_any()
            .downcast::<ReducerCell<S, A>>()
            .map_err(|_| cursor.mismatch("state of another type"))?,
        Some(other) => return Err(cursor.mismatch(other.name())),
    };

    // Queued actions are reduced with the reducer of the render that reads them
    *cell.reducer.borrow_mut() = reducer;
    let state = match cell.drain() {
        Some(state) => {
            cursor.mark(UnitFlags::STATE_UPDATE);
            state
        }
        None => cell.state.borrow().clone(),
    };
    let dispatch = Dispatch {
        cell: Rc::downgrade(&cell),
        scheduler: cursor.scheduler(),
    };
    let slot: Rc<dyn StateRecord> = cell;
    cursor.finish(HookSlot::State(slot));
    Ok((state, dispatch))
}

// =============================================================================
// use_state
// =============================================================================

/// Update accepted by [`SetState`].
pub enum SetStateAction<T> {
    Value(T),
    Update(Box<dyn FnOnce(&T) -> T>),
}

fn apply_set_state<T: Clone>(state: &T, action: SetStateAction<T>) -> T {
    match action {
        SetStateAction::Value(value) => value,
        SetStateAction::Update(update) => update(state),
    }
}

/// Setter returned by [`use_state`].
pub struct SetState<T> {
    dispatch: Dispatch<T, SetStateAction<T>>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            dispatch: self.dispatch.clone(),
        }
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetState({:p})", self.dispatch.cell.as_ptr())
    }
}

impl<T: Clone + PartialEq + 'static> SetState<T> {
    /// Replace the state.
    pub fn set(&self, value: T) {
        self.dispatch.dispatch(SetStateAction::Value(value));
    }

    /// Compute the next state from the latest one.
    pub fn update(&self, update: impl FnOnce(&T) -> T + 'static) {
        self.dispatch.dispatch(SetStateAction::Update(Box::new(update)));
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.dispatch.ptr_eq(&other.dispatch)
    }
}

/// Local state. `init` runs on mount only.
pub fn use_state<T>(init: impl FnOnce() -> T) -> Result<(T, SetState<T>), HookError>
where
    T: Clone + PartialEq + 'static,
{
    let reducer: Reducer<T, SetStateAction<T>> = Rc::new(apply_set_state::<T>);
    let (value, dispatch) = reducer_hook("use_state", reducer, init)?;
    Ok((value, SetState { dispatch }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FiberId;
    use crate::hooks::{render_with_hooks, RenderFrame};

    struct Harness {
        scheduler: Rc<SchedulerShared>,
        hooks: Vec<HookSlot>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                scheduler: Rc::new(SchedulerShared::default()),
                hooks: Vec::new(),
            }
        }

        fn render<R>(&mut self, body: impl FnOnce() -> R) -> R {
            let frame = RenderFrame::new(
                FiberId(0),
                "Test",
                std::mem::take(&mut self.hooks),
                Vec::new(),
                Rc::downgrade(&self.scheduler),
            );
            let (result, hooks, _) = render_with_hooks(frame, body);
            self.hooks = hooks;
            self.scheduler.take_pending();
            result
        }
    }

    #[test]
    fn test_state_persists_and_updates_apply_in_order() {
        let mut harness = Harness::new();
        let (value, set) = harness.render(|| use_state(|| 1).unwrap());
        assert_eq!(value, 1);

        set.set(5);
        set.update(|v| v * 10);
        assert!(harness.scheduler.is_pending());

        let (value, _) = harness.render(|| use_state(|| 1).unwrap());
        assert_eq!(value, 50);
    }

    #[test]
    fn test_setting_equal_state_skips_render() {
        let mut harness = Harness::new();
        let (_, set) = harness.render(|| use_state(|| "same".to_string()).unwrap());
        set.set("same".to_string());
        assert!(!harness.scheduler.is_pending());
    }

    fn settle(hooks: &[HookSlot], commit: bool) {
        for hook in hooks {
            if commit {
                hook.commit_state();
            } else {
                hook.rollback_state();
            }
        }
    }

    #[test]
    fn test_abandoned_render_requeues_drained_state() {
        let mut harness = Harness::new();
        let (_, set) = harness.render(|| use_state(|| 0).unwrap());
        set.set(1);
        let (value, _) = harness.render(|| use_state(|| 0).unwrap());
        assert_eq!(value, 1);
        settle(&harness.hooks, false);

        // Output still shows 0, so setting 1 again is real work
        set.set(1);
        assert!(harness.scheduler.is_pending());
        let (value, _) = harness.render(|| use_state(|| 0).unwrap());
        assert_eq!(value, 1);
    }

    #[test]
    fn test_committed_state_is_the_bail_out_baseline() {
        let mut harness = Harness::new();
        let (_, set) = harness.render(|| use_state(|| 0).unwrap());
        set.set(4);
        harness.render(|| use_state(|| 0).unwrap());
        settle(&harness.hooks, true);
        settle(&harness.hooks, false);

        set.set(4);
        assert!(!harness.scheduler.is_pending());
    }

    #[test]
    fn test_reducer_uses_latest_reducer() {
        let mut harness = Harness::new();
        let (_, dispatch) = harness.render(|| use_reducer(|s: &i32, a: i32| s + a, || 0).unwrap());
        dispatch.dispatch(1);
        dispatch.dispatch(2);

        // Second action was queued behind the eager one and reduces with the new reducer
        let (value, _) = harness.render(|| use_reducer(|s: &i32, a: i32| s + a * 100, || 0).unwrap());
        assert_eq!(value, 201);
    }

    #[test]
    fn test_dispatch_is_stable_across_renders() {
        let mut harness = Harness::new();
        let (_, first) = harness.render(|| use_state(|| 0).unwrap());
        let (_, second) = harness.render(|| use_state(|| 0).unwrap());
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn test_dispatch_after_unmount_is_ignored() {
        let mut harness = Harness::new();
        let (_, set) = harness.render(|| use_state(|| 0).unwrap());
        harness.hooks.clear();
        set.set(3);
        assert!(!harness.scheduler.is_pending());
    }

    #[test]
    fn test_state_type_change_is_mismatch() {
        let mut harness = Harness::new();
        harness.render(|| use_state(|| 0i32).unwrap());
        let err = harness.render(|| use_state(|| 0u8).map(|_| ())).unwrap_err();
        assert!(matches!(err, HookError::OrderMismatch { hook: "use_state", index: 0, .. }));
    }
}
