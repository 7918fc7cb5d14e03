//! # spark-fiber
//!
//! Incremental UI reconciliation for Rust.
//!
//! Components describe output as immutable [`Element`] trees. A [`Root`]
//! turns each new description into a tree of work units, diffs it against the
//! previous generation, and applies the minimal set of mutations to a
//! [`Host`](host::Host) output tree. Function components keep state across
//! renders through hooks.
//!
//! ## Architecture
//!
//! ```text
//! build/h → Element tree → work loop (render, interruptible) → commit → effects
//!                               ↑                                         │
//!                               └──────── setState / dispatch ────────────┘
//! ```
//!
//! The render pass is pure with respect to the host: it can yield between
//! units, be discarded by a newer request, or fail without leaving partial
//! output. The commit pass is atomic and runs to completion.
//!
//! ## Modules
//!
//! - [`element`] - Element model, `build`/`h` factories, component kinds
//! - [`types`] - Attributes, props, events, mutation tags
//! - [`engine`] - Work units and the per-root arena
//! - [`hooks`] - `use_state`, `use_effect`, `use_memo`, `use_ref`, `use_context`, ...
//! - [`pipeline`] - Root, work loop, reconciler, commit engine
//! - [`host`] - Output-tree trait and the in-memory DOM
//!
//! ## Example
//!
//! ```ignore
//! use spark_fiber::{build, deps, use_effect, use_state, Attributes, Kind, MemoryDom, Root, RootConfig};
//!
//! fn counter(_: &Props) -> Rendered {
//!     let (count, set_count) = use_state(|| 0)?;
//!     let label = format!("clicked {count}");
//!     Ok(build("button", Attributes::new().on("click", move |_| set_count.update(|n| n + 1)), label))
//! }
//!
//! let mut root = Root::new(MemoryDom::new(), RootConfig::default());
//! let container = root.host_mut().create_container();
//! root.render(build(Kind::component(counter), Attributes::new(), ()), container)?;
//! ```

pub mod element;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod host;
pub mod pipeline;
pub mod types;

// Re-export commonly used items
pub use element::{
    build, h, Child, ClassComponent, ClassType, Element, ElementKind, FunctionComponent, Kind, Rendered,
};

pub use types::{event_name, AttrValue, Attributes, Event, EventListener, Key, MutationTag, Props, RefCallback, UnitFlags};

pub use error::{EffectError, HookError, RenderError};

pub use engine::{Fiber, FiberArena, FiberId, UnitKind};

pub use hooks::{
    create_context, current_component, current_unit, use_callback, use_context, use_effect, use_memo,
    use_reducer, use_ref, use_state, Cleanup, Context, ContextId, Deps, Dispatch, EffectResult, RefObject,
    SetState, SetStateAction,
};

pub use host::{DomStats, Host, MemoryDom, NodeId};

pub use pipeline::{
    update_properties, CommitLog, Deadline, MutationRecord, Phase, ReconcileStrategy, Root, RootConfig, RootStats,
    SchedulerMode, TimeSlice, Unbounded, UnitBudget, Updater, WorkStatus,
};
