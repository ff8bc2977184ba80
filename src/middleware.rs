//! The middleware adapter.
//!
//! Wiring follows the usual middleware shape, one step per call:
//!
//! ```text
//! Flow (configuration) ──bind(dispatch)──▶ NextHandler ──next(next)──▶ ActionHandler
//! ```
//!
//! [`ActionHandler::handle`] classifies each incoming value. Plain, untagged
//! actions go straight to the next handler and its return value comes back
//! unchanged. Everything else is resolved by a [`Driver`] using the bound
//! dispatch, and the caller gets a future that settles through the
//! configured success or error handler.
//!
//! # Example
//!
//! ```
//! use flo::{Deferred, Flow, Handled, Outcome, Resolved};
//!
//! # tokio_test::block_on(async {
//! let handler = Flow::new()
//!     .bind(|action: &'static str| Outcome::Ready(Resolved::Value(action.len())))
//!     .next(|action: &'static str| format!("next saw {}", action));
//!
//! match handler.handle(Deferred::action("plain")) {
//!     Handled::Forwarded(out) => assert_eq!(out, "next saw plain"),
//!     Handled::Resolving(_) => unreachable!(),
//! }
//!
//! let resolving = handler
//!     .handle(Deferred::actions(vec!["ab", "c"]))
//!     .into_resolving()
//!     .unwrap();
//! assert_eq!(resolving.await, Ok(Resolved::sequence_of(vec![2, 1])));
//! # });
//! ```

use std::fmt;
use std::sync::Arc;

use futures::future::FutureExt;

use crate::classify::classify;
use crate::deferred::Deferred;
use crate::diagnostic::{DefaultSink, DiagnosticSink, Report};
use crate::driver::{Dispatch, Driver};
use crate::failure::Failure;
use crate::outcome::{Outcome, Resolution};
use crate::shape::Assemble;

/// Called with the resolved value; its return value settles the future.
pub type SuccessHandler<V> = Arc<dyn Fn(V) -> Result<V, Failure> + Send + Sync>;

/// Called with the failure; returning `Ok` recovers, `Err` rejects.
pub type ErrorHandler<V> = Arc<dyn Fn(Failure) -> Result<V, Failure> + Send + Sync>;

/// Middleware configuration.
///
/// # Example
///
/// ```
/// use flo::{Failure, Flow, Resolved};
///
/// let flow: Flow<Resolved<i32>> = Flow::new()
///     .with_success_handler(|value| Ok(Resolved::Sequence(vec![value])))
///     .with_error_handler(|_failure: Failure| Ok(Resolved::Value(-1)))
///     .with_max_depth(32);
/// # let _ = flow;
/// ```
pub struct Flow<V> {
    on_success: Option<SuccessHandler<V>>,
    on_error: Option<ErrorHandler<V>>,
    sink: Arc<dyn DiagnosticSink>,
    max_depth: Option<usize>,
}

impl<V> fmt::Debug for Flow<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("custom_success_handler", &self.on_success.is_some())
            .field("custom_error_handler", &self.on_error.is_some())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl<V> Default for Flow<V>
where
    V: Assemble + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Flow<V>
where
    V: Assemble + Send + 'static,
{
    /// Default configuration: identity success handler, reporting error
    /// handler, unbounded nesting.
    ///
    /// Reports go to [`DefaultSink`]. With the `tracing` feature they are
    /// error events, or lines on standard error when no subscriber listens.
    pub fn new() -> Self {
        Flow {
            on_success: None,
            on_error: None,
            sink: Arc::new(DefaultSink::default()),
            max_depth: None,
        }
    }

    /// Replace the success handler.
    pub fn with_success_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(V) -> Result<V, Failure> + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(handler));
        self
    }

    /// Replace the error handler.
    ///
    /// The default sink is not used once a custom error handler is set.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Failure) -> Result<V, Failure> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Send default error reports to `sink`.
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: DiagnosticSink + 'static,
    {
        self.sink = Arc::new(sink);
        self
    }

    /// Fail resolution nested deeper than `limit` levels.
    pub fn with_max_depth(mut self, limit: usize) -> Self {
        self.max_depth = Some(limit);
        self
    }

    /// Bind the dispatch capability of the host pipeline.
    pub fn bind<A, D>(self, dispatch: D) -> NextHandler<A, V>
    where
        A: Send + 'static,
        D: Dispatch<A, V> + 'static,
    {
        let on_error = match self.on_error {
            Some(handler) => handler,
            None => report_and_reject(self.sink),
        };
        NextHandler {
            driver: Driver::new(dispatch).with_max_depth(self.max_depth),
            on_success: self.on_success.unwrap_or_else(identity),
            on_error,
        }
    }
}

fn identity<V: 'static>() -> SuccessHandler<V> {
    Arc::new(|value: V| -> Result<V, Failure> { Ok(value) })
}

/// The default error handler.
///
/// Non-error failures become [`Failure::TypeMismatch`]; the failure is
/// reported to `sink` and then rejected.
pub fn report_and_reject<V: 'static>(sink: Arc<dyn DiagnosticSink>) -> ErrorHandler<V> {
    Arc::new(move |failure: Failure| -> Result<V, Failure> {
        let failure = failure.into_error_like();
        sink.report(&Report(&failure).to_string());
        Err(failure)
    })
}

/// A middleware bound to a dispatch capability, waiting for its next handler.
pub struct NextHandler<A, V> {
    driver: Driver<A, V>,
    on_success: SuccessHandler<V>,
    on_error: ErrorHandler<V>,
}

impl<A, V> Clone for NextHandler<A, V> {
    fn clone(&self) -> Self {
        NextHandler {
            driver: self.driver.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<A, V> fmt::Debug for NextHandler<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NextHandler")
            .field("driver", &self.driver)
            .finish()
    }
}

impl<A, V> NextHandler<A, V>
where
    A: Send + 'static,
    V: Assemble + Send + 'static,
{
    /// Attach the continuation for values that are not deferred effects.
    pub fn next<N, R>(self, next: N) -> ActionHandler<A, V, N>
    where
        N: Fn(A) -> R,
    {
        ActionHandler { inner: self, next }
    }

    /// Resolve `effect` and settle through the configured handlers.
    pub fn resolve(&self, effect: Deferred<A, V>) -> Resolution<V> {
        let resolving = self.driver.resolve(effect);
        let on_success = self.on_success.clone();
        let on_error = self.on_error.clone();
        async move {
            match resolving.await {
                Ok(value) => on_success(value),
                Err(failure) => on_error(failure),
            }
        }
        .boxed()
    }
}

/// What [`ActionHandler::handle`] returns.
pub enum Handled<R, V> {
    /// The value was a plain action; this is what the next handler returned.
    Forwarded(R),
    /// The value is being resolved.
    Resolving(Resolution<V>),
}

impl<R, V> Handled<R, V> {
    /// Whether the value went to the next handler.
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Handled::Forwarded(_))
    }

    /// The next handler's return value, if the value was forwarded.
    pub fn into_forwarded(self) -> Option<R> {
        match self {
            Handled::Forwarded(out) => Some(out),
            Handled::Resolving(_) => None,
        }
    }

    /// The pending resolution, if the value was a deferred effect.
    pub fn into_resolving(self) -> Option<Resolution<V>> {
        match self {
            Handled::Forwarded(_) => None,
            Handled::Resolving(fut) => Some(fut),
        }
    }
}

impl<R: fmt::Debug, V> fmt::Debug for Handled<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handled::Forwarded(out) => f.debug_tuple("Forwarded").field(out).finish(),
            Handled::Resolving(_) => f.write_str("Resolving(<future>)"),
        }
    }
}

/// Lets an action handler serve as the dispatch of another pipeline stage.
impl<V> From<Handled<Outcome<V>, V>> for Outcome<V> {
    fn from(handled: Handled<Outcome<V>, V>) -> Self {
        match handled {
            Handled::Forwarded(outcome) => outcome,
            Handled::Resolving(fut) => Outcome::Pending(fut),
        }
    }
}

/// A fully wired middleware.
pub struct ActionHandler<A, V, N> {
    inner: NextHandler<A, V>,
    next: N,
}

impl<A, V, N> fmt::Debug for ActionHandler<A, V, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandler")
            .field("inner", &self.inner)
            .field("next", &"<function>")
            .finish()
    }
}

impl<A, V, N, R> ActionHandler<A, V, N>
where
    A: Send + 'static,
    V: Assemble + Send + 'static,
    N: Fn(A) -> R,
{
    /// Handle one incoming value.
    ///
    /// Untagged concrete actions are forwarded synchronously. Anything else,
    /// including a tagged concrete action, is resolved.
    pub fn handle(&self, action: Deferred<A, V>) -> Handled<R, V> {
        let classified = classify(&action);
        match action {
            Deferred::Action(action) if !classified.needs_resolution() => {
                Handled::Forwarded((self.next)(action))
            }
            effect => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    kind = %classified.kind,
                    tagged = classified.tagged,
                    "resolving incoming effect"
                );
                Handled::Resolving(self.inner.resolve(effect))
            }
        }
    }
}
