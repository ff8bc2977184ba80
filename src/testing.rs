//! Testing utilities for code that resolves deferred effects.
//!
//! - [`RecordingDispatch`]: a dispatch capability that remembers every
//!   action it receives and answers with a stub;
//! - [`MemorySink`]: a diagnostic sink that keeps reports in memory;
//! - [`assert_resolved!`](crate::assert_resolved) and
//!   [`assert_rejected!`](crate::assert_rejected) for resolution results.
//!
//! # Example
//!
//! ```rust
//! use flo::testing::{MemorySink, RecordingDispatch};
//! use flo::{assert_resolved, Deferred, Flow, Resolved};
//!
//! # tokio_test::block_on(async {
//! let dispatch = RecordingDispatch::constant(Resolved::Value(200));
//! let handler = Flow::new()
//!     .with_sink(MemorySink::new())
//!     .bind(dispatch.clone())
//!     .next(|_: &'static str| ());
//!
//! let result = handler
//!     .handle(Deferred::actions(vec!["google", "facebook"]))
//!     .into_resolving()
//!     .unwrap()
//!     .await;
//!
//! assert_resolved!(result, Resolved::sequence_of(vec![200, 200]));
//! assert_eq!(dispatch.actions(), vec!["google", "facebook"]);
//! # });
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::diagnostic::DiagnosticSink;
use crate::driver::Dispatch;
use crate::outcome::Outcome;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Responder<A, V> = Arc<dyn Fn(&A) -> Outcome<V> + Send + Sync>;

/// A dispatch capability that records the actions it receives.
///
/// Clones share the same log.
pub struct RecordingDispatch<A, V> {
    log: Arc<Mutex<Vec<A>>>,
    respond: Responder<A, V>,
}

impl<A, V> Clone for RecordingDispatch<A, V> {
    fn clone(&self) -> Self {
        RecordingDispatch {
            log: self.log.clone(),
            respond: self.respond.clone(),
        }
    }
}

impl<A: fmt::Debug, V> fmt::Debug for RecordingDispatch<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingDispatch")
            .field("log", &*lock(&self.log))
            .finish()
    }
}

impl<A, V> RecordingDispatch<A, V> {
    /// Answer every action with `respond(&action)`.
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&A) -> Outcome<V> + Send + Sync + 'static,
    {
        RecordingDispatch {
            log: Arc::new(Mutex::new(Vec::new())),
            respond: Arc::new(respond),
        }
    }

    /// Answer every action with a clone of `value`.
    pub fn constant(value: V) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        Self::new(move |_| Outcome::Ready(value.clone()))
    }

    /// Number of actions dispatched so far.
    pub fn calls(&self) -> usize {
        lock(&self.log).len()
    }

    /// The actions dispatched so far, in dispatch order.
    pub fn actions(&self) -> Vec<A>
    where
        A: Clone,
    {
        lock(&self.log).clone()
    }
}

impl<A, V> Dispatch<A, V> for RecordingDispatch<A, V>
where
    A: Send,
{
    fn dispatch(&self, action: A) -> Outcome<V> {
        let outcome = (self.respond)(&action);
        lock(&self.log).push(action);
        outcome
    }
}

/// A diagnostic sink that keeps every report in memory.
///
/// Clones share the same reports.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The reports received so far.
    pub fn reports(&self) -> Vec<String> {
        lock(&self.reports).clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, text: &str) {
        lock(&self.reports).push(text.to_string());
    }
}

/// Assert that a resolution succeeded, optionally with a given value.
///
/// # Example
///
/// ```rust
/// use flo::{assert_resolved, Failure};
///
/// let result: Result<i32, Failure> = Ok(42);
/// assert_resolved!(result.clone());
/// assert_resolved!(result, 42);
/// ```
#[macro_export]
macro_rules! assert_resolved {
    ($result:expr) => {
        match $result {
            Ok(_) => {}
            Err(failure) => {
                panic!("Expected resolution, got failure: {:?}", failure);
            }
        }
    };
    ($result:expr, $expected:expr) => {
        match $result {
            Ok(value) => assert_eq!(value, $expected),
            Err(failure) => {
                panic!("Expected resolution, got failure: {:?}", failure);
            }
        }
    };
}

/// Assert that a resolution failed, optionally matching a pattern.
///
/// # Example
///
/// ```rust
/// use flo::{assert_rejected, Failure};
///
/// let result: Result<i32, Failure> = Err(Failure::value("boom"));
/// assert_rejected!(result.clone());
/// assert_rejected!(result, Failure::Value(_));
/// ```
#[macro_export]
macro_rules! assert_rejected {
    ($result:expr) => {
        match $result {
            Err(_) => {}
            Ok(value) => {
                panic!("Expected failure, got resolution: {:?}", value);
            }
        }
    };
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {}
            Err(failure) => {
                panic!(
                    "Expected failure matching {}, got: {:?}",
                    stringify!($pattern),
                    failure
                );
            }
            Ok(value) => {
                panic!("Expected failure, got resolution: {:?}", value);
            }
        }
    };
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
impl<T> Arbitrary for crate::shape::Resolved<T>
where
    T: Arbitrary + fmt::Debug + Clone + 'static,
{
    type Parameters = T::Parameters;
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(args: Self::Parameters) -> Self::Strategy {
        use crate::shape::Resolved;

        let leaf = any_with::<T>(args).prop_map(Resolved::Value);
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Resolved::Sequence),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Resolved::Keyed),
            ]
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::Failure;
    use crate::shape::Resolved;

    #[test]
    fn recording_dispatch_logs_in_order() {
        let dispatch = RecordingDispatch::new(|action: &i32| Outcome::Ready(action * 2));
        let shared = dispatch.clone();

        assert!(matches!(dispatch.dispatch(1), Outcome::Ready(2)));
        assert!(matches!(shared.dispatch(5), Outcome::Ready(10)));

        assert_eq!(dispatch.calls(), 2);
        assert_eq!(dispatch.actions(), vec![1, 5]);
    }

    #[test]
    fn memory_sink_shares_reports() {
        let sink = MemorySink::new();
        sink.clone().report("first");
        sink.report("second");
        assert_eq!(sink.reports(), vec!["first", "second"]);
    }

    #[test]
    fn assert_resolved_macro() {
        let result: Result<Resolved<i32>, Failure> = Ok(Resolved::Value(1));
        assert_resolved!(result.clone());
        assert_resolved!(result, Resolved::Value(1));
    }

    #[test]
    fn assert_rejected_macro() {
        let result: Result<i32, Failure> = Err(Failure::DepthExceeded { limit: 1 });
        assert_rejected!(result.clone());
        assert_rejected!(result, Failure::DepthExceeded { limit: 1 });
    }

    #[test]
    #[should_panic(expected = "Expected resolution, got failure")]
    fn assert_resolved_panics_on_failure() {
        let result: Result<i32, Failure> = Err(Failure::value("x"));
        assert_resolved!(result);
    }

    #[test]
    #[should_panic(expected = "Expected failure matching")]
    fn assert_rejected_panics_on_other_failure() {
        let result: Result<i32, Failure> = Err(Failure::value("x"));
        assert_rejected!(result, Failure::Misuse(_));
    }

    #[cfg(feature = "proptest")]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn resolved_arbitrary_is_well_formed(tree in any::<Resolved<u8>>()) {
                match &tree {
                    Resolved::Value(_) => prop_assert!(tree.len().is_none()),
                    _ => prop_assert!(tree.len().is_some()),
                }
            }
        }
    }
}
