//! Context: values provided by an ancestor and read by any descendant.
//!
//! A [`Context`] is a typed handle with a default value. `provider` wraps
//! children in a provider element; [`use_context`] reads the value of the
//! nearest enclosing provider, or the default when there is none. The work
//! loop collects provider values while walking up from the rendering unit,
//! so a provider re-rendering with a new value reaches consumers on the same
//! pass.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::begin_hook;
use super::HookSlot;
use crate::element::{Child, Element, ElementKind};
use crate::error::HookError;
use crate::types::{AttrValue, Attributes, PROVIDER_VALUE_ATTRIBUTE};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a context, unique per `create_context` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Numeric value of the id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Typed context handle.
pub struct Context<T> {
    id: ContextId,
    default: Rc<T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: self.default.clone(),
        }
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({})", self.id.0)
    }
}

/// New context with its own identity and `default` as fallback value.
pub fn create_context<T: 'static>(default: T) -> Context<T> {
    Context {
        id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
        default: Rc::new(default),
    }
}

impl<T: 'static> Context<T> {
    /// Identity shared by every clone of this handle.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Value read when no provider is above the reader.
    pub fn default_value(&self) -> Rc<T> {
        self.default.clone()
    }

    /// Provider element making `value` visible to `children`.
    pub fn provider(&self, value: T, children: impl Into<Child>) -> Element {
        Element::new(
            ElementKind::Provider(self.id),
            Attributes::new().with(PROVIDER_VALUE_ATTRIBUTE, AttrValue::any(value)),
            children.into().into_elements(),
        )
    }
}

/// Value of the nearest provider of `context`, else its default.
///
/// Fails with [`HookError::InvalidContext`] when the nearest provider holds no
/// value of type `T`.
pub fn use_context<T: 'static>(context: &Context<T>) -> Result<Rc<T>, HookError> {
    const HOOK: &str = "use_context";

    let mut cursor = begin_hook(HOOK)?;
    if let Some(previous) = cursor.take_previous() {
        if !matches!(previous, HookSlot::Context(_)) {
            return Err(cursor.mismatch(previous.name()));
        }
    }

    let value = match cursor.context(context.id) {
        None => context.default.clone(),
        Some(Some(value)) => value
            .downcast::<T>()
            .map_err(|_| HookError::InvalidContext { hook: HOOK })?,
        Some(None) => return Err(HookError::InvalidContext { hook: HOOK }),
    };
    let slot: Rc<dyn Any> = value.clone();
    cursor.finish(HookSlot::Context(slot));
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::rc::Weak;

    use super::*;
    use crate::engine::FiberId;
    use crate::hooks::{render_with_hooks, ContextValues, RenderFrame};

    fn render_with<R>(contexts: ContextValues, body: impl FnOnce() -> R) -> R {
        let frame = RenderFrame::new(FiberId(0), "Test", Vec::new(), contexts, Weak::new());
        render_with_hooks(frame, body).0
    }

    #[test]
    fn test_default_without_provider() {
        let theme = create_context("light");
        let value = render_with(Vec::new(), || use_context(&theme).unwrap());
        assert_eq!(*value, "light");
    }

    #[test]
    fn test_nearest_provider_wins() {
        let theme = create_context(0u8);
        let near: Rc<dyn Any> = Rc::new(2u8);
        let far: Rc<dyn Any> = Rc::new(1u8);
        let contexts = vec![(theme.id(), Some(near)), (theme.id(), Some(far))];
        let value = render_with(contexts, || use_context(&theme).unwrap());
        assert_eq!(*value, 2);
    }

    #[test]
    fn test_wrongly_typed_provider_is_invalid() {
        let theme = create_context(0u8);
        let wrong: Rc<dyn Any> = Rc::new("text");
        let err = render_with(vec![(theme.id(), Some(wrong))], || use_context(&theme).unwrap_err());
        assert_eq!(err, HookError::InvalidContext { hook: "use_context" });

        let err = render_with(vec![(theme.id(), None)], || use_context(&theme).unwrap_err());
        assert_eq!(err, HookError::InvalidContext { hook: "use_context" });
    }

    #[test]
    fn test_contexts_have_distinct_ids() {
        assert_ne!(create_context(()).id(), create_context(()).id());
    }

    #[test]
    fn test_provider_element_carries_value() {
        let theme = create_context(String::from("light"));
        let element = theme.provider(String::from("dark"), "child");
        assert_eq!(element.kind(), &ElementKind::Provider(theme.id()));
        assert_eq!(
            element.props().value::<String>(PROVIDER_VALUE_ATTRIBUTE).as_deref(),
            Some(&String::from("dark"))
        );
        assert_eq!(element.children().len(), 1);
    }
}
