//! Render pipeline
//!
//! This module turns element trees into output-tree mutations.
//!
//! # Pipeline Architecture
//!
//! ```text
//! Root::render / state update → work loop (render pass) → commit → effects
//! ```
//!
//! ## Data Flow
//!
//! 1. **work_loop** - builds the work-in-progress unit tree one unit at a time,
//!    running components and calling the reconciler for each unit's children
//! 2. **reconcile** - tags the new children CREATE/UPDATE and collects removed ones
//! 3. **commit** - applies deletions, placements and attribute diffs to the host,
//!    then runs effect cleanups and effects
//! 4. **mount** - the [`Root`] that owns all of the above for one container
//!
//! ## Key Design Principles
//!
//! - **Atomic commit**: the host is only touched after a pass completed; an
//!   aborted pass leaves the committed output as it was
//! - **Per-root state**: unit storage, hook records and the request flag all
//!   belong to one root, so independent roots never interfere

mod commit;
mod config;
mod mount;
mod reconcile;
mod work_loop;

// Re-exports
pub use commit::{update_properties, CommitLog, MutationRecord};
pub use config::{RootConfig, SchedulerMode};
pub use mount::{Root, RootStats};
pub use reconcile::ReconcileStrategy;
pub use work_loop::{Deadline, Phase, TimeSlice, Unbounded, UnitBudget, Updater, WorkStatus};

pub(crate) use work_loop::{schedule_render, SchedulerShared};
