//! Dependency lists for effects and memos.

use std::any::Any;
use std::fmt;

/// A value that can sit in a dependency list.
///
/// Implemented for every `PartialEq + 'static` type; two entries are equal
/// when they have the same type and compare equal.
pub trait DepValue: Any {
    fn as_any(&self) -> &dyn Any;
    fn dep_eq(&self, other: &dyn DepValue) -> bool;
}

impl<T: PartialEq + 'static> DepValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dep_eq(&self, other: &dyn DepValue) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|other| other == self)
    }
}

/// Ordered dependency list. Build one with [`deps!`](crate::deps).
#[derive(Default)]
pub struct Deps(Vec<Box<dyn DepValue>>);

impl Deps {
    /// Empty list: the hook runs on mount only.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Box<dyn DepValue>>) -> Self {
        Self(values)
    }

    pub fn with<T: PartialEq + 'static>(mut self, value: T) -> Self {
        self.0.push(Box::new(value));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same length and pairwise equal.
    pub fn same_as(&self, other: &Deps) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| a.dep_eq(&**b))
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deps(len={})", self.0.len())
    }
}

/// Dependency list literal: `deps![count, name.clone()]`.
#[macro_export]
macro_rules! deps {
    ($($dep:expr),* $(,)?) => {
        $crate::hooks::Deps::from_values(vec![
            $(Box::new($dep) as Box<dyn $crate::hooks::DepValue>),*
        ])
    };
}

/// Whether a hook with `next` deps must re-run after a generation that used
/// `previous`. An absent list always re-runs.
pub(crate) fn deps_changed(previous: Option<&Deps>, next: Option<&Deps>) -> bool {
    match (previous, next) {
        (_, None) | (None, Some(_)) => true,
        (Some(previous), Some(next)) => !previous.same_as(next),
    }
}
