//! Fiber arena - slot allocation for work units.
//!
//! Manages the lifecycle of work-unit slots:
//! - Free slot pool for O(1) reuse
//! - Subtree release once a generation is superseded
//! - Pre-order navigation shared by the work loop and the commit engine
//!
//! Every root owns one arena, so independent roots never share unit storage.

use std::ops::{Index, IndexMut};

use super::fiber::{Fiber, FiberId};
use crate::types::UnitFlags;

/// Owner of every work unit of one root.
pub struct FiberArena<N> {
    slots: Vec<Option<Fiber<N>>>,
    free: Vec<usize>,
    live: usize,
}

impl<N> Default for FiberArena<N> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<N> FiberArena<N> {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Store a unit, reusing a freed slot when one is available.
    pub fn allocate(&mut self, fiber: Fiber<N>) -> FiberId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(fiber);
                FiberId(index)
            }
            None => {
                self.slots.push(Some(fiber));
                FiberId(self.slots.len() - 1)
            }
        }
    }

    /// Drop a unit and return its slot to the pool.
    pub fn release(&mut self, id: FiberId) -> Option<Fiber<N>> {
        let fiber = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        self.live -= 1;

        // Nothing left: shrink back instead of keeping a long free list around
        if self.live == 0 {
            self.slots.clear();
            self.free.clear();
        }
        Some(fiber)
    }

    /// Release `root` and every unit below it.
    pub fn release_subtree(&mut self, root: FiberId) -> usize {
        let ids = self.subtree(root);
        let count = ids.len();
        for id in ids {
            self.release(id);
        }
        count
    }

    /// Release everything.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn get(&self, id: FiberId) -> Option<&Fiber<N>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<N>> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live units.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Direct children of `id`, in sibling order.
    pub fn children(&self, id: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self[id].child;
        while let Some(child) = next {
            out.push(child);
            next = self[child].sibling;
        }
        out
    }

    /// `root` and all its descendants in pre-order.
    pub fn subtree(&self, root: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self.get(root).map(|_| root);
        while let Some(id) = next {
            out.push(id);
            next = self.next_preorder(id, root, true);
        }
        out
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Next unit in depth-first pre-order, never leaving `root`'s subtree.
    ///
    /// With `descend == false` the children of `id` are skipped.
    pub fn next_preorder(&self, id: FiberId, root: FiberId, descend: bool) -> Option<FiberId> {
        if descend {
            if let Some(child) = self[id].child {
                return Some(child);
            }
        }
        let mut current = id;
        loop {
            if current == root {
                return None;
            }
            if let Some(sibling) = self[current].sibling {
                return Some(sibling);
            }
            current = self[current].parent?;
        }
    }

    /// Nearest strict ancestor that owns an output node.
    pub fn host_parent(&self, id: FiberId) -> Option<FiberId> {
        let mut current = self[id].parent;
        while let Some(parent) = current {
            if self[parent].node.is_some() {
                return Some(parent);
            }
            current = self[parent].parent;
        }
        None
    }

    /// Fold a finished unit's flags into its parent's subtree flags.
    pub(crate) fn complete(&mut self, id: FiberId) {
        let fiber = &self[id];
        let bubbled = fiber.flags | fiber.subtree_flags;
        let parent = fiber.parent;
        if bubbled.is_empty() {
            return;
        }
        if let Some(parent) = parent {
            self[parent].subtree_flags |= bubbled;
        }
    }

    /// Whether `id` or anything below it carries one of `flags`.
    pub fn subtree_has(&self, id: FiberId, flags: UnitFlags) -> bool {
        let fiber = &self[id];
        fiber.flags.intersects(flags) || fiber.subtree_flags.intersects(flags)
    }

    /// Forget previous-generation links below `root` once that generation is gone.
    pub(crate) fn clear_alternates(&mut self, root: FiberId) {
        for id in self.subtree(root) {
            self[id].alternate = None;
        }
    }
}

impl<N: Clone> FiberArena<N> {
    /// Output nodes that represent `id` in its host parent: its own node, or
    /// the topmost nodes of its descendants when `id` owns none.
    pub fn host_nodes(&self, id: FiberId) -> Vec<N> {
        let mut out = Vec::new();
        let mut next = Some(id);
        while let Some(current) = next {
            let descend = match &self[current].node {
                Some(node) => {
                    out.push(node.clone());
                    false
                }
                None => true,
            };
            next = self.next_preorder(current, id, descend);
        }
        out
    }
}

impl<N> Index<FiberId> for FiberArena<N> {
    type Output = Fiber<N>;

    fn index(&self, id: FiberId) -> &Fiber<N> {
        self.get(id)
            .unwrap_or_else(|| panic!("work unit {id:?} used after release"))
    }
}

impl<N> IndexMut<FiberId> for FiberArena<N> {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber<N> {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("work unit {id:?} used after release"))
    }
}
