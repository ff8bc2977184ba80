//! Future coercion.
//!
//! A dispatch call, a thunk, or a mappable container can hand back a value
//! that is ready, already failed, still pending, or produced lazily by a
//! callable. [`Outcome`] names those four cases and [`to_future`] turns any
//! of them into one canonical future, so the driver only ever awaits.

use std::fmt;

use futures::future::{self, BoxFuture, FutureExt};

use crate::failure::Failure;

/// A future that settles with a resolved value or a [`Failure`].
pub type Resolution<V> = BoxFuture<'static, Result<V, Failure>>;

/// A zero-argument callable producing an [`Outcome`].
pub type Thunk<V> = Box<dyn FnOnce() -> Outcome<V> + Send + 'static>;

/// A value that may already be available, failed, pending or lazily produced.
///
/// # Examples
///
/// ```
/// use flo::outcome::{to_future, Outcome};
///
/// # tokio_test::block_on(async {
/// let lazy = Outcome::lazy(|| Outcome::Ready(42));
/// assert_eq!(to_future(lazy).await, Ok(42));
/// # });
/// ```
pub enum Outcome<V> {
    /// The value is available now.
    Ready(V),
    /// The work already failed.
    Failed(Failure),
    /// The value arrives later.
    Pending(Resolution<V>),
    /// The value is produced by calling this function.
    Lazy(Thunk<V>),
}

impl<V> Outcome<V> {
    /// Wrap a future.
    pub fn pending<F>(fut: F) -> Self
    where
        F: std::future::Future<Output = Result<V, Failure>> + Send + 'static,
    {
        Outcome::Pending(fut.boxed())
    }

    /// Wrap a zero-argument callable.
    pub fn lazy<F>(f: F) -> Self
    where
        F: FnOnce() -> Outcome<V> + Send + 'static,
    {
        Outcome::Lazy(Box::new(f))
    }
}

impl<V> From<Result<V, Failure>> for Outcome<V> {
    fn from(result: Result<V, Failure>) -> Self {
        match result {
            Ok(value) => Outcome::Ready(value),
            Err(failure) => Outcome::Failed(failure),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Outcome<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Outcome::Failed(failure) => f.debug_tuple("Failed").field(failure).finish(),
            Outcome::Pending(_) => f.write_str("Pending(<future>)"),
            Outcome::Lazy(_) => f.write_str("Lazy(<function>)"),
        }
    }
}

/// Coerce an [`Outcome`] into a future.
///
/// Pending outcomes are returned as they are. Lazy outcomes are invoked and
/// their result coerced again. Ready and failed outcomes become futures that
/// are already settled. A callable that fails does so through
/// [`Outcome::Failed`], so the failure surfaces as a rejected future rather
/// than at the call site.
pub fn to_future<V>(outcome: Outcome<V>) -> Resolution<V>
where
    V: Send + 'static,
{
    match outcome {
        Outcome::Ready(value) => future::ready(Ok(value)).boxed(),
        Outcome::Failed(failure) => future::ready(Err(failure)).boxed(),
        Outcome::Pending(fut) => fut,
        Outcome::Lazy(thunk) => to_future(thunk()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ready_resolves() {
        assert_eq!(to_future(Outcome::Ready(1)).await, Ok(1));
    }

    #[tokio::test]
    async fn test_failed_rejects() {
        let result = to_future::<i32>(Outcome::Failed(Failure::value("nope"))).await;
        assert_eq!(result, Err(Failure::value("nope")));
    }

    #[tokio::test]
    async fn test_pending_passes_through() {
        let outcome = Outcome::pending(async {
            tokio::task::yield_now().await;
            Ok(7)
        });
        assert_eq!(to_future(outcome).await, Ok(7));
    }

    #[tokio::test]
    async fn test_lazy_invoked_once_and_coerced() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let outcome = Outcome::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Outcome::pending(async { Ok("later") })
        });

        assert_eq!(to_future(outcome).await, Ok("later"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lazy_failure_becomes_rejection() {
        let outcome: Outcome<i32> = Outcome::lazy(|| Outcome::Failed(Failure::message("bad")));
        let fut = to_future(outcome);
        assert_eq!(fut.await, Err(Failure::message("bad")));
    }

    #[test]
    fn test_from_result() {
        assert!(matches!(Outcome::from(Ok::<_, Failure>(3)), Outcome::Ready(3)));
        assert!(matches!(
            Outcome::<i32>::from(Err(Failure::value("x"))),
            Outcome::Failed(_)
        ));
    }
}
