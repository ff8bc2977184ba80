//! Ways to write a resumable computation.
//!
//! Rust has no stable generators, so a [`Computation`] is either an explicit
//! state machine or an `async` body that suspends through a [`Yielder`]:
//!
//! - [`from_fn`] wraps a closure that receives each [`Input`] and returns the
//!   next [`Step`];
//! - [`Coroutine`] runs an `async` block whose only suspension points are
//!   [`Yielder::suspend`] calls.
//!
//! # Example
//!
//! ```
//! use flo::coroutine::Coroutine;
//! use flo::{Deferred, Resolved};
//!
//! let checkout = Coroutine::new(|co| async move {
//!     let cart = co.suspend(Deferred::action("load_cart")).await?;
//!     let _receipt = co.suspend(Deferred::action("charge")).await?;
//!     Ok(cart)
//! });
//! let effect: Deferred<&str, Resolved<&str>> = Deferred::computation(checkout);
//! # let _ = effect;
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt};

use crate::deferred::{Computation, Deferred, Step};
use crate::failure::Failure;

/// What a computation receives when it is stepped.
#[derive(Debug)]
pub enum Input<V> {
    /// First step.
    Start,
    /// The last yielded effect resolved to this value.
    Value(V),
    /// The last yielded effect failed.
    Failure(Failure),
}

/// A computation backed by a closure. Created by [`from_fn`].
pub struct FnComputation<A, V, F> {
    f: F,
    _marker: PhantomData<fn() -> (A, V)>,
}

impl<A, V, F> fmt::Debug for FnComputation<A, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComputation")
            .field("f", &"<function>")
            .finish()
    }
}

/// Build a computation from a step function.
///
/// The closure keeps its own state between calls.
///
/// # Example
///
/// ```
/// use flo::coroutine::{from_fn, Input};
/// use flo::{Deferred, Resolved, Step};
///
/// let mut sent = false;
/// let ping = from_fn(move |input: Input<Resolved<&str>>| match input {
///     Input::Start if !sent => {
///         sent = true;
///         Step::Yield(Deferred::action("ping"))
///     }
///     Input::Value(pong) => Step::Complete(pong),
///     Input::Failure(failure) => Step::Fail(failure),
///     Input::Start => Step::Complete(Resolved::Value("twice")),
/// });
/// let effect: Deferred<&str, Resolved<&str>> = Deferred::computation(ping);
/// # let _ = effect;
/// ```
pub fn from_fn<A, V, F>(f: F) -> FnComputation<A, V, F>
where
    F: FnMut(Input<V>) -> Step<A, V> + Send,
{
    FnComputation {
        f,
        _marker: PhantomData,
    }
}

impl<A, V, F> Computation<A, V> for FnComputation<A, V, F>
where
    F: FnMut(Input<V>) -> Step<A, V> + Send,
{
    fn start(&mut self) -> Step<A, V> {
        (self.f)(Input::Start)
    }

    fn resume(&mut self, value: V) -> Step<A, V> {
        (self.f)(Input::Value(value))
    }

    fn throw(&mut self, failure: Failure) -> Step<A, V> {
        (self.f)(Input::Failure(failure))
    }
}

struct Slot<A, V> {
    yielded: Option<Deferred<A, V>>,
    input: Option<Result<V, Failure>>,
    // Set when a second effect is yielded within one step.
    overlapping: bool,
}

fn lock<A, V>(slot: &Mutex<Slot<A, V>>) -> MutexGuard<'_, Slot<A, V>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle a [`Coroutine`] body uses to suspend on an effect.
pub struct Yielder<A, V> {
    slot: Arc<Mutex<Slot<A, V>>>,
}

impl<A, V> Clone for Yielder<A, V> {
    fn clone(&self) -> Self {
        Yielder {
            slot: self.slot.clone(),
        }
    }
}

impl<A, V> fmt::Debug for Yielder<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Yielder")
    }
}

impl<A, V> Yielder<A, V> {
    /// Suspend the body until `effect` is resolved.
    ///
    /// Resolves to the effect's value, or to its failure so the body can
    /// recover or propagate it with `?`.
    pub fn suspend(&self, effect: Deferred<A, V>) -> Suspend<A, V> {
        Suspend {
            slot: self.slot.clone(),
            effect: Some(effect),
        }
    }
}

/// Future returned by [`Yielder::suspend`].
pub struct Suspend<A, V> {
    slot: Arc<Mutex<Slot<A, V>>>,
    effect: Option<Deferred<A, V>>,
}

// No field is ever pinned.
impl<A, V> Unpin for Suspend<A, V> {}

impl<A, V> fmt::Debug for Suspend<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspend")
            .field("yielded", &self.effect.is_none())
            .finish()
    }
}

impl<A, V> Future for Suspend<A, V> {
    type Output = Result<V, Failure>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut slot = lock(&this.slot);
        if let Some(effect) = this.effect.take() {
            if slot.yielded.is_some() {
                slot.overlapping = true;
            } else {
                slot.yielded = Some(effect);
            }
            return Poll::Pending;
        }
        match slot.input.take() {
            Some(input) => Poll::Ready(input),
            None => Poll::Pending,
        }
    }
}

/// A computation written as an `async` body.
///
/// The body is polled once per step. Each poll must either finish or stop at
/// exactly one [`Yielder::suspend`]; a body that waits on anything else
/// fails with [`Failure::Misuse`]. Stepping a finished coroutine fails the
/// same way.
pub struct Coroutine<A, V> {
    slot: Arc<Mutex<Slot<A, V>>>,
    body: Option<BoxFuture<'static, Result<V, Failure>>>,
}

impl<A, V> fmt::Debug for Coroutine<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("finished", &self.body.is_none())
            .finish()
    }
}

impl<A, V> Coroutine<A, V>
where
    A: Send + 'static,
    V: Send + 'static,
{
    /// Create a coroutine from a body that receives its [`Yielder`].
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Yielder<A, V>) -> Fut,
        Fut: Future<Output = Result<V, Failure>> + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Slot {
            yielded: None,
            input: None,
            overlapping: false,
        }));
        let yielder = Yielder { slot: slot.clone() };
        Coroutine {
            slot,
            body: Some(body(yielder).boxed()),
        }
    }

    fn step(&mut self, input: Option<Result<V, Failure>>) -> Step<A, V> {
        let Some(body) = self.body.as_mut() else {
            return Step::Fail(Failure::Misuse(
                "coroutine stepped after it finished".to_string(),
            ));
        };
        lock(&self.slot).input = input;

        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let polled = body.as_mut().poll(&mut cx);

        let (yielded, overlapping) = {
            let mut slot = lock(&self.slot);
            (slot.yielded.take(), mem::take(&mut slot.overlapping))
        };
        if overlapping {
            self.body = None;
            return Step::Fail(Failure::Misuse(
                "coroutine body suspended on more than one effect at once".to_string(),
            ));
        }

        match polled {
            Poll::Ready(result) => {
                self.body = None;
                match result {
                    Ok(value) => Step::Complete(value),
                    Err(failure) => Step::Fail(failure),
                }
            }
            Poll::Pending => match yielded {
                Some(effect) => Step::Yield(effect),
                None => {
                    self.body = None;
                    Step::Fail(Failure::Misuse(
                        "coroutine body waited on something other than its yielder".to_string(),
                    ))
                }
            },
        }
    }
}

impl<A, V> Computation<A, V> for Coroutine<A, V>
where
    A: Send + 'static,
    V: Send + 'static,
{
    fn start(&mut self) -> Step<A, V> {
        self.step(None)
    }

    fn resume(&mut self, value: V) -> Step<A, V> {
        self.step(Some(Ok(value)))
    }

    fn throw(&mut self, failure: Failure) -> Step<A, V> {
        self.step(Some(Err(failure)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Resolved;

    type Co = Coroutine<&'static str, Resolved<&'static str>>;

    fn expect_yield(step: Step<&'static str, Resolved<&'static str>>) -> &'static str {
        match step {
            Step::Yield(Deferred::Action(action)) => action,
            other => panic!("expected a yielded action, got {:?}", other),
        }
    }

    #[test]
    fn test_coroutine_yields_then_completes() {
        let mut co: Co = Coroutine::new(|co| async move {
            let first = co.suspend(Deferred::action("a")).await?;
            let second = co.suspend(Deferred::action("b")).await?;
            Ok(Resolved::Sequence(vec![first, second]))
        });

        assert_eq!(expect_yield(co.start()), "a");
        assert_eq!(expect_yield(co.resume(Resolved::Value("1"))), "b");
        match co.resume(Resolved::Value("2")) {
            Step::Complete(value) => assert_eq!(value, Resolved::sequence_of(vec!["1", "2"])),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_coroutine_propagates_thrown_failure() {
        let mut co: Co = Coroutine::new(|co| async move {
            co.suspend(Deferred::action("a")).await?;
            Ok(Resolved::Value("unreachable"))
        });

        co.start();
        match co.throw(Failure::message("down")) {
            Step::Fail(failure) => assert_eq!(failure, Failure::message("down")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_coroutine_recovers_from_thrown_failure() {
        let mut co: Co = Coroutine::new(|co| async move {
            match co.suspend(Deferred::action("risky")).await {
                Ok(value) => Ok(value),
                Err(_) => co.suspend(Deferred::action("fallback")).await,
            }
        });

        assert_eq!(expect_yield(co.start()), "risky");
        assert_eq!(expect_yield(co.throw(Failure::value("nope"))), "fallback");
        assert!(matches!(
            co.resume(Resolved::Value("ok")),
            Step::Complete(Resolved::Value("ok"))
        ));
    }

    #[test]
    fn test_stepping_finished_coroutine_is_misuse() {
        let mut co: Co = Coroutine::new(|_| async { Ok(Resolved::Value("done")) });
        assert!(matches!(co.start(), Step::Complete(_)));
        assert!(matches!(co.resume(Resolved::Value("x")), Step::Fail(Failure::Misuse(_))));
    }

    #[test]
    fn test_foreign_await_is_misuse() {
        let mut co: Co = Coroutine::new(|_| async {
            futures::future::pending::<()>().await;
            Ok(Resolved::Value("never"))
        });
        assert!(matches!(co.start(), Step::Fail(Failure::Misuse(_))));
    }

    #[test]
    fn test_concurrent_suspends_are_misuse() {
        let mut co: Co = Coroutine::new(|co| async move {
            let (first, second) = futures::join!(
                co.suspend(Deferred::action("a")),
                co.suspend(Deferred::action("b"))
            );
            Ok(Resolved::Sequence(vec![first?, second?]))
        });

        match co.start() {
            Step::Fail(Failure::Misuse(msg)) => assert!(msg.contains("more than one effect")),
            other => panic!("expected misuse, got {:?}", other),
        }
        assert!(matches!(co.resume(Resolved::Value("x")), Step::Fail(Failure::Misuse(_))));
    }

    #[test]
    fn test_from_fn_sees_every_input() {
        let mut seen = Vec::new();
        {
            let mut computation = from_fn(|input: Input<Resolved<&'static str>>| {
                seen.push(format!("{:?}", input));
                match input {
                    Input::Start => Step::Yield(Deferred::action("a")),
                    Input::Value(v) => Step::Complete(v),
                    Input::Failure(f) => Step::Fail(f),
                }
            });
            expect_yield(computation.start());
            computation.throw(Failure::value("x"));
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], "Start");
        assert!(seen[1].starts_with("Failure"));
    }
}
