//! Hooks - per-unit state for function components.
//!
//! Every function component unit owns an ordered list of hook records. The
//! n-th hook called during a render reads the n-th record left by the
//! previous generation and writes the n-th record of the new one, so hooks
//! must be called in the same order on every render of a component.
//!
//! | hook | record | re-runs when |
//! |------|--------|--------------|
//! | [`use_state`] / [`use_reducer`] | shared state cell + update queue | never (queue drained on read) |
//! | [`use_effect`] | deps, pending callback, cleanup | deps changed or absent |
//! | [`use_memo`] / [`use_callback`] | cached value + deps | deps changed or absent |
//! | [`use_ref`] | mutable box | never |
//! | [`use_context`] | resolved provider value | every render |
//!
//! Calling a hook outside a component render yields
//! [`HookError::OutsideRender`](crate::error::HookError::OutsideRender);
//! reading a record of the wrong kind yields
//! [`HookError::OrderMismatch`](crate::error::HookError::OrderMismatch).

mod context;
mod deps;
mod effect;
mod memo;
mod refs;
mod runtime;
mod state;

use std::any::Any;
use std::rc::Rc;

pub use context::{create_context, use_context, Context, ContextId};
pub use deps::{DepValue, Deps};
pub use effect::{use_effect, Cleanup, EffectResult};
pub use memo::{use_callback, use_memo};
pub use refs::{use_ref, RefObject};
pub use runtime::{current_component, current_unit};
pub use state::{use_reducer, use_state, Dispatch, SetState, SetStateAction};

use effect::EffectCell;
pub(crate) use runtime::{render_with_hooks, ContextValues, RenderFrame};
use state::StateRecord;

/// One hook record.
#[derive(Clone)]
pub(crate) enum HookSlot {
    State(Rc<dyn StateRecord>),
    Effect(Rc<EffectCell>),
    Memo(Rc<dyn Any>),
    Ref(Rc<dyn Any>),
    Context(Rc<dyn Any>),
    /// Position of a hook call that failed before storing a record
    Vacant,
}

impl HookSlot {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            HookSlot::State(_) => "state",
            HookSlot::Effect(_) => "effect",
            HookSlot::Memo(_) => "memo",
            HookSlot::Ref(_) => "ref",
            HookSlot::Context(_) => "context",
            HookSlot::Vacant => "vacant",
        }
    }

    /// Accept the state this render drained as committed.
    pub(crate) fn commit_state(&self) {
        if let HookSlot::State(record) = self {
            record.commit();
        }
    }

    /// Hand the state this render drained back to the update queue.
    pub(crate) fn rollback_state(&self) {
        if let HookSlot::State(record) = self {
            record.rollback();
        }
    }
}
