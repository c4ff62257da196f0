//! Opaque per-machine state.
//!
//! The engine stores whatever a machine's `transition` returns under that
//! machine's identifier and hands it back to the same machine later. Nothing
//! else interprets it: a machine downcasts only the state it produced itself.

use std::any::Any;
use std::fmt::Debug;

/// Upcast to [`Any`] so opaque states can be downcast by their producer.
///
/// Implemented for every `'static` type; there is no need to implement it by
/// hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Trait for values produced by state machine transitions.
///
/// # Required Traits
///
/// - `Debug`: states must be debuggable for diagnostics
/// - `Send` + `Sync`: snapshots are read from the serial executor and from
///   background after-track workers
///
/// # Example
///
/// ```rust
/// use contextflow::core::State;
/// use std::sync::Arc;
///
/// #[derive(Debug, PartialEq)]
/// enum Visibility {
///     Shown,
///     Hidden,
/// }
///
/// impl State for Visibility {
///     fn name(&self) -> &str {
///         match self {
///             Self::Shown => "Shown",
///             Self::Hidden => "Hidden",
///         }
///     }
/// }
///
/// let state: Arc<dyn State> = Arc::new(Visibility::Hidden);
/// assert_eq!(state.downcast_ref::<Visibility>(), Some(&Visibility::Hidden));
/// ```
pub trait State: AsAny + Debug + Send + Sync {
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;
}

impl dyn State {
    /// Borrow the state as its concrete type.
    ///
    /// Returns `None` when the state was produced by another type. Machines
    /// should only downcast states they produced themselves.
    pub fn downcast_ref<T: State>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: State>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, PartialEq, Debug)]
    enum TestState {
        Initial,
        Processing { step: u32 },
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Initial => "Initial",
                Self::Processing { .. } => "Processing",
            }
        }
    }

    #[derive(Debug)]
    struct OtherState;

    impl State for OtherState {
        fn name(&self) -> &str {
            "Other"
        }
    }

    #[test]
    fn state_name_returns_correct_value() {
        assert_eq!(TestState::Initial.name(), "Initial");
        assert_eq!(TestState::Processing { step: 1 }.name(), "Processing");
    }

    #[test]
    fn downcast_recovers_concrete_state() {
        let state: Arc<dyn State> = Arc::new(TestState::Processing { step: 2 });

        assert!(state.is::<TestState>());
        assert_eq!(
            state.downcast_ref::<TestState>(),
            Some(&TestState::Processing { step: 2 })
        );
    }

    #[test]
    fn downcast_to_foreign_type_is_none() {
        let state: Arc<dyn State> = Arc::new(OtherState);

        assert!(!state.is::<TestState>());
        assert!(state.downcast_ref::<TestState>().is_none());
        assert_eq!(state.name(), "Other");
    }
}
