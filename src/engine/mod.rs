//! Work-unit tree - fibers and the arena that owns them.
//!
//! The engine manages the core data structures:
//! - Arena: slot allocation, free pool, subtree release
//! - Fiber: one node's reconciliation state for one generation
//!
//! # Architecture
//!
//! Units are NOT reference-counted objects. They are slots in a per-root arena
//! linked by index:
//!
//! ```text
//! #root (node=container)
//!  └─child→ App (component, hooks=[state, effect])
//!            └─child→ div (node=3) ─sibling→ p (node=5)
//!                      └─child→ #text (node=4)
//! ```
//!
//! Every render produces a fresh generation of units; each points at its
//! predecessor through `alternate` until the new generation is committed and
//! the old one released.

mod arena;
mod fiber;

pub use arena::*;
pub use fiber::*;
