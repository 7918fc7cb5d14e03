#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_fiber::{MemoryDom, NodeId, Root, RootConfig};

/// Fresh root rendering into a fresh container.
pub fn mount(config: RootConfig) -> (Root<MemoryDom>, NodeId) {
    let mut root = Root::new(MemoryDom::new(), config);
    let container = root.host_mut().create_container();
    (root, container)
}

pub fn html(root: &Root<MemoryDom>, container: NodeId) -> String {
    root.host().inner_html(container)
}

/// Shared counter for component bodies and callbacks.
#[derive(Clone, Default)]
pub struct Counter(Rc<Cell<usize>>);

impl Counter {
    pub fn hit(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// Shared ordered log of events.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Slot a component writes a handle into so the test can drive it later.
pub struct Captured<T>(Rc<RefCell<Option<T>>>);

impl<T> Clone for Captured<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Captured<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }
}

impl<T: Clone> Captured<T> {
    pub fn store(&self, value: T) {
        *self.0.borrow_mut() = Some(value);
    }

    pub fn get(&self) -> T {
        self.0.borrow().clone().expect("component never stored a handle")
    }
}
