//! Error types.
//!
//! Three categories with different propagation rules:
//! - [`HookError`] - hook misuse, fatal to the current render attempt
//! - [`RenderError`] - anything that aborts a render pass; surfaces to whoever
//!   triggered the cycle (`Root::render`, `Root::work`, `Root::flush`)
//! - [`EffectError`] - failures inside effect callbacks and cleanups; captured
//!   per hook, logged, and never abort the rest of the effect pass

use thiserror::Error;

/// Misuse of the hook runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// A hook was called while no component render was in progress.
    #[error("{hook} called outside of a component render")]
    OutsideRender {
        /// Name of the offending hook
        hook: &'static str,
    },

    /// The record stored at this position on the previous render belongs to a
    /// different hook (call order changed between renders).
    #[error("{hook} at position {index} found a {found} record from the previous render")]
    OrderMismatch {
        /// Name of the offending hook
        hook: &'static str,
        /// Position of the call in hook order
        index: usize,
        /// Kind of record previously stored at that position
        found: &'static str,
    },

    /// A provider for the context exists but does not carry a value of the
    /// context's type.
    #[error("{hook} received an invalid context object")]
    InvalidContext {
        /// Name of the offending hook
        hook: &'static str,
    },
}

/// Error that aborts a render pass.
///
/// No partial commit ever results from one: the previously committed output
/// tree stays as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Hook misuse inside a component body.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// A component body reported a failure.
    #[error("component {component} failed: {message}")]
    Component {
        /// Component name (or `"unknown"` when raised through [`RenderError::msg`])
        component: String,
        /// Failure description
        message: String,
    },

    /// Effects kept scheduling renders past the configured limit.
    #[error("render loop exceeded {limit} consecutive cycles")]
    UpdateDepthExceeded {
        /// Configured `RootConfig::max_render_cycles`
        limit: usize,
    },
}

impl RenderError {
    /// Build a component failure from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        RenderError::Component {
            component: "unknown".into(),
            message: message.into(),
        }
    }

    /// Build a component failure naming the component.
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        RenderError::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failure inside an effect callback, a cleanup, or a class lifecycle method.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EffectError {
    message: String,
}

impl EffectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for EffectError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for EffectError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_errors_name_the_hook() {
        let err = HookError::OutsideRender { hook: "use_state" };
        assert!(err.to_string().contains("use_state"));

        let err = HookError::InvalidContext { hook: "use_context" };
        assert!(err.to_string().contains("use_context"));
    }

    #[test]
    fn test_hook_error_converts_into_render_error() {
        fn body() -> Result<(), RenderError> {
            Err(HookError::OutsideRender { hook: "use_ref" })?;
            Ok(())
        }

        let err = body().unwrap_err();
        assert_eq!(err, RenderError::Hook(HookError::OutsideRender { hook: "use_ref" }));
        assert_eq!(err.to_string(), "use_ref called outside of a component render");
    }

    #[test]
    fn test_effect_error_from_str() {
        let err: EffectError = "boom".into();
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "boom");
    }
}
