//! The coroutine driver.
//!
//! [`Driver::resolve`] turns any [`Deferred`] into a [`Resolution`]:
//!
//! - concrete actions go through the dispatch capability, and whatever
//!   dispatch returns is coerced with [`to_future`];
//! - batches and mappable containers go through the structural mapper, with
//!   `resolve` itself as the transform, and are joined;
//! - resumable computations and pull-sequences are driven step by step;
//! - futures and thunks are coerced directly.
//!
//! Driving a computation is a small state machine:
//!
//! ```text
//! Start ──start()──▶ Resolve(effect) ──ok──▶ Resume(value) ──resume()──┐
//!   │                   ▲   │                                          │
//!   │                   │   └──err──▶ Resume(failure) ──throw()────────┤
//!   │                   └────────────── Yield(effect) ◀────────────────┤
//!   └──────────────▶ Done(value) / Failed(failure) ◀──── Complete/Fail ┘
//! ```
//!
//! A computation never sees its next input before the effect it yielded has
//! fully settled, even when that effect is a batch resolved concurrently.

use std::cell::Cell;
use std::fmt;
use std::mem;
use std::sync::Arc;

use futures::future::{self, FutureExt};

use crate::classify::classify;
use crate::deferred::{Computation, Deferred, Step, Transform};
use crate::failure::Failure;
use crate::mapper::{join, map, Container};
use crate::outcome::{to_future, Outcome, Resolution};
use crate::shape::Assemble;

/// The dispatch capability of the host pipeline.
///
/// Implemented for every `Fn(A) -> Outcome<V> + Send + Sync`. Dispatch may
/// return another pending value, for instance when the pipeline routes the
/// action through this engine again.
pub trait Dispatch<A, V>: Send + Sync {
    /// Dispatch a concrete action.
    fn dispatch(&self, action: A) -> Outcome<V>;
}

impl<A, V, F> Dispatch<A, V> for F
where
    F: Fn(A) -> Outcome<V> + Send + Sync,
{
    fn dispatch(&self, action: A) -> Outcome<V> {
        self(action)
    }
}

/// Resolves deferred effects against a dispatch capability.
///
/// # Example
///
/// ```
/// use flo::{Deferred, Driver, Outcome, Resolved};
///
/// # tokio_test::block_on(async {
/// let driver = Driver::new(|action: &'static str| Outcome::Ready(Resolved::Value(action.len())));
/// let result = driver.resolve(Deferred::actions(vec!["a", "bcd"])).await;
/// assert_eq!(result, Ok(Resolved::sequence_of(vec![1, 3])));
/// # });
/// ```
pub struct Driver<A, V> {
    dispatch: Arc<dyn Dispatch<A, V>>,
    max_depth: Option<usize>,
    depth: usize,
}

impl<A, V> Clone for Driver<A, V> {
    fn clone(&self) -> Self {
        Driver {
            dispatch: self.dispatch.clone(),
            max_depth: self.max_depth,
            depth: self.depth,
        }
    }
}

impl<A, V> fmt::Debug for Driver<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("dispatch", &"<dispatch>")
            .field("max_depth", &self.max_depth)
            .field("depth", &self.depth)
            .finish()
    }
}

enum Phase<A, V> {
    Start,
    Resolve(Deferred<A, V>),
    Resume(Result<V, Failure>),
    Done(V),
    Failed(Failure),
}

impl<A, V> Phase<A, V> {
    fn after(step: Step<A, V>) -> Self {
        match step {
            Step::Yield(effect) => Phase::Resolve(effect),
            Step::Complete(value) => Phase::Done(value),
            Step::Fail(failure) => Phase::Failed(failure),
        }
    }
}

impl<A, V> Driver<A, V>
where
    A: Send + 'static,
    V: Assemble + Send + 'static,
{
    /// Create a driver dispatching through `dispatch`.
    pub fn new<D>(dispatch: D) -> Self
    where
        D: Dispatch<A, V> + 'static,
    {
        Self::from_shared(Arc::new(dispatch))
    }

    /// Create a driver from an already shared dispatch capability.
    pub fn from_shared(dispatch: Arc<dyn Dispatch<A, V>>) -> Self {
        Driver {
            dispatch,
            max_depth: None,
            depth: 0,
        }
    }

    /// Fail nested resolution deeper than `limit` levels.
    ///
    /// `None`, the default, leaves nesting unbounded.
    pub fn with_max_depth(mut self, limit: Option<usize>) -> Self {
        self.max_depth = limit;
        self
    }

    fn at_depth(&self, depth: usize) -> Self {
        Driver {
            dispatch: self.dispatch.clone(),
            max_depth: self.max_depth,
            depth,
        }
    }

    fn nested(&self) -> Self {
        self.at_depth(self.depth + 1)
    }

    fn transform(&self) -> Transform<A, V> {
        let nested = self.nested();
        Arc::new(move |effect| nested.resolve(effect))
    }

    /// Resolve a deferred effect into its value.
    ///
    /// Nesting is counted through batches, computations and dispatch calls
    /// that synchronously resolve further effects, so a dispatch that feeds
    /// the pipeline back into itself still trips the depth limit.
    pub fn resolve(&self, effect: Deferred<A, V>) -> Resolution<V> {
        let driver = self.at_depth(self.depth.max(Dispatching::current()));
        if let Some(limit) = driver.max_depth {
            if driver.depth > limit {
                return future::ready(Err(Failure::DepthExceeded { limit })).boxed();
            }
        }

        #[cfg(feature = "tracing")]
        {
            let classified = classify(&effect);
            tracing::debug!(
                kind = %classified.kind,
                tagged = classified.tagged,
                depth = driver.depth,
                "resolving deferred effect"
            );
        }

        let (effect, _) = effect.untag();
        match effect {
            Deferred::Action(action) => {
                let _dispatching = Dispatching::enter(driver.depth + 1);
                to_future(driver.dispatch.dispatch(action))
            }
            Deferred::Computation(computation) => driver.drive(computation),
            Deferred::Pull(iter) => driver.drive(Box::new(PullSequence::new(iter))),
            Deferred::Future(fut) => fut,
            Deferred::Thunk(thunk) => to_future(Outcome::Lazy(thunk)),
            Deferred::Tagged(payload) => driver.resolve(*payload),
            container => match Container::from_deferred(container) {
                Ok(container) => join(map(driver.transform(), container)),
                Err(other) => future::ready(Err(Failure::Misuse(format!(
                    "cannot resolve {} effect",
                    classify(&other).kind
                ))))
                .boxed(),
            },
        }
    }

    /// Drive a resumable computation to completion.
    ///
    /// The computation is consumed: once it completes or fails it is never
    /// stepped again.
    pub fn drive(&self, mut computation: Box<dyn Computation<A, V>>) -> Resolution<V> {
        let driver = self.nested();
        let driving = async move {
            let mut phase = Phase::Start;
            loop {
                phase = match phase {
                    Phase::Start => Phase::after(computation.start()),
                    Phase::Resolve(effect) => Phase::Resume(driver.resolve(effect).await),
                    Phase::Resume(Ok(value)) => Phase::after(computation.resume(value)),
                    Phase::Resume(Err(failure)) => Phase::after(computation.throw(failure)),
                    Phase::Done(value) => return Ok(value),
                    Phase::Failed(failure) => return Err(failure),
                };
            }
        };

        #[cfg(feature = "tracing")]
        let driving = {
            use tracing::Instrument as _;
            driving.instrument(tracing::debug_span!("flo.drive", depth = self.depth))
        };

        driving.boxed()
    }
}

thread_local! {
    static DISPATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Depth of the dispatch call running on this thread.
///
/// Set for the duration of a dispatch and restored on drop, so resolution
/// started from inside dispatch continues counting from the caller's depth.
struct Dispatching {
    previous: usize,
}

impl Dispatching {
    fn enter(depth: usize) -> Self {
        let previous = DISPATCH_DEPTH.with(|current| current.replace(depth));
        Dispatching { previous }
    }

    fn current() -> usize {
        DISPATCH_DEPTH.with(Cell::get)
    }
}

impl Drop for Dispatching {
    fn drop(&mut self) {
        DISPATCH_DEPTH.with(|current| current.set(self.previous));
    }
}

/// A pull-sequence seen as a computation.
///
/// Each pulled effect is resolved before the next pull; the resolved values
/// are collected and become the final value. Iterators cannot catch a
/// failure, so a thrown failure ends the sequence.
struct PullSequence<A, V> {
    iter: Box<dyn Iterator<Item = Deferred<A, V>> + Send>,
    resolved: Vec<V>,
}

impl<A, V> PullSequence<A, V> {
    fn new(iter: Box<dyn Iterator<Item = Deferred<A, V>> + Send>) -> Self {
        PullSequence {
            iter,
            resolved: Vec::new(),
        }
    }
}

impl<A, V> PullSequence<A, V>
where
    V: Assemble,
{
    fn pull(&mut self) -> Step<A, V> {
        match self.iter.next() {
            Some(effect) => Step::Yield(effect),
            None => Step::Complete(V::sequence(mem::take(&mut self.resolved))),
        }
    }
}

impl<A, V> Computation<A, V> for PullSequence<A, V>
where
    V: Assemble + Send,
{
    fn start(&mut self) -> Step<A, V> {
        self.pull()
    }

    fn resume(&mut self, value: V) -> Step<A, V> {
        self.resolved.push(value);
        self.pull()
    }

    fn throw(&mut self, failure: Failure) -> Step<A, V> {
        Step::Fail(failure)
    }
}
