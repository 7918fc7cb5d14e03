//! Ref hook: a mutable box that survives renders without triggering them.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::runtime::begin_hook;
use super::HookSlot;
use crate::error::HookError;
use crate::types::RefCallback;

/// Handle returned by [`use_ref`]. Clones share the same box.
pub struct RefObject<T>(Rc<RefCell<T>>);

impl<T> Clone for RefObject<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for RefObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefObject").field(&self.0.borrow()).finish()
    }
}

impl<T> RefObject<T> {
    /// Shared borrow of the boxed value.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutable borrow of the boxed value. Never schedules a render.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Overwrite the boxed value.
    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    /// Overwrite the boxed value and return the old one.
    pub fn replace(&self, value: T) -> T {
        self.0.replace(value)
    }

    /// Whether both handles point at the same box.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> RefObject<T> {
    /// Clone of the boxed value.
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<N: Clone + 'static> RefObject<Option<N>> {
    /// Ref callback that stores the host node of type `N` in this box.
    ///
    /// Pass it as the `ref` attribute of a host element.
    pub fn node_ref(&self) -> RefCallback {
        let target = self.0.clone();
        RefCallback::new(move |node| {
            *target.borrow_mut() = node.and_then(|node| node.downcast_ref::<N>()).cloned();
        })
    }
}

/// Mutable box created on mount and returned unchanged on every render.
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> Result<RefObject<T>, HookError> {
    let mut cursor = begin_hook("use_ref")?;
    let cell = match cursor.take_previous() {
        None => Rc::new(RefCell::new(init())),
        Some(HookSlot::Ref(any)) => any
            .downcast::<RefCell<T>>()
            .map_err(|_| cursor.mismatch("ref of another type"))?,
        Some(other) => return Err(cursor.mismatch(other.name())),
    };
    let slot: Rc<dyn Any> = cell.clone();
    cursor.finish(HookSlot::Ref(slot));
    Ok(RefObject(cell))
}
