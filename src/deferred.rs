//! The deferred effect model.
//!
//! A [`Deferred`] describes work to finish before an action, or a set of
//! actions, can be dispatched. It is a closed enumeration: every shape the
//! engine understands has its own variant, and the [`classify`] module
//! decides which one applies.
//!
//! Two shapes carry behavior of their own and are modeled as narrow traits:
//!
//! - [`Computation`]: a resumable computation stepped with
//!   `start` / `resume` / `throw`;
//! - [`Mappable`]: a container that knows how to apply a transform to its
//!   own contents.
//!
//! [`classify`]: crate::classify

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::failure::Failure;
use crate::outcome::{Outcome, Resolution};

/// Discriminant of the action-creator tag produced by [`flo`].
pub const FLO: &str = "FLO";

/// The transform a [`Mappable`] container applies to each of its members.
///
/// Calling it starts resolution of one member and returns its pending result.
pub type Transform<A, V> = Arc<dyn Fn(Deferred<A, V>) -> Resolution<V> + Send + Sync>;

/// Result of stepping a [`Computation`].
pub enum Step<A, V> {
    /// The computation suspended on an effect it needs resolved.
    Yield(Deferred<A, V>),
    /// The computation finished with a value.
    Complete(V),
    /// The computation terminated with a failure.
    Fail(Failure),
}

impl<A: fmt::Debug, V: fmt::Debug> fmt::Debug for Step<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Yield(effect) => f.debug_tuple("Yield").field(effect).finish(),
            Step::Complete(value) => f.debug_tuple("Complete").field(value).finish(),
            Step::Fail(failure) => f.debug_tuple("Fail").field(failure).finish(),
        }
    }
}

/// A resumable computation.
///
/// The driver calls [`start`](Computation::start) once, then either
/// [`resume`](Computation::resume) with the resolved value of the last
/// yielded effect or [`throw`](Computation::throw) with its failure, until
/// the computation returns [`Step::Complete`] or [`Step::Fail`]. A
/// computation that catches a thrown failure may keep yielding.
///
/// Most callers build one with [`Coroutine`](crate::coroutine::Coroutine) or
/// [`from_fn`](crate::coroutine::from_fn) rather than implementing the trait.
pub trait Computation<A, V>: Send {
    /// Step the computation for the first time.
    fn start(&mut self) -> Step<A, V>;

    /// Step the computation with the value its last effect resolved to.
    fn resume(&mut self, value: V) -> Step<A, V>;

    /// Inject the failure its last effect resolved to.
    fn throw(&mut self, failure: Failure) -> Step<A, V>;
}

/// A container that owns its mapping behavior.
///
/// The engine never looks inside a mappable container: it hands over the
/// transform and uses whatever the container returns.
///
/// # Example
///
/// ```
/// use flo::{Deferred, Mappable, Outcome, Resolved, Transform};
///
/// /// Resolves one member and wraps its value in a one-element sequence.
/// struct Boxed(Deferred<&'static str, Resolved<&'static str>>);
///
/// impl Mappable<&'static str, Resolved<&'static str>> for Boxed {
///     fn map(
///         self: Box<Self>,
///         transform: Transform<&'static str, Resolved<&'static str>>,
///     ) -> Outcome<Resolved<&'static str>> {
///         let pending = transform(self.0);
///         Outcome::pending(async move { Ok(Resolved::Sequence(vec![pending.await?])) })
///     }
/// }
/// ```
pub trait Mappable<A, V>: Send {
    /// Apply `transform` to every contained member and return the
    /// like-shaped result.
    fn map(self: Box<Self>, transform: Transform<A, V>) -> Outcome<V>;
}

/// A deferred effect.
///
/// `A` is the concrete action type accepted by dispatch, `V` the value type
/// effects resolve to.
pub enum Deferred<A, V> {
    /// A concrete action, dispatched as is.
    Action(A),
    /// An ordered batch, resolved concurrently into a sequence.
    Sequence(Vec<Deferred<A, V>>),
    /// A labeled batch, resolved concurrently into a keyed map.
    Keyed(BTreeMap<String, Deferred<A, V>>),
    /// A resumable computation, driven to completion.
    Computation(Box<dyn Computation<A, V>>),
    /// A pull-sequence, driven to exhaustion.
    Pull(Box<dyn Iterator<Item = Deferred<A, V>> + Send>),
    /// A container that maps itself.
    Mappable(Box<dyn Mappable<A, V>>),
    /// A pending value.
    Future(Resolution<V>),
    /// A lazily produced value.
    Thunk(Box<dyn FnOnce() -> Outcome<V> + Send>),
    /// The action-creator tag wrapping another deferred effect.
    Tagged(Box<Deferred<A, V>>),
}

impl<A, V> Deferred<A, V> {
    /// A concrete action.
    pub fn action(action: A) -> Self {
        Deferred::Action(action)
    }

    /// An ordered batch.
    pub fn sequence(items: impl IntoIterator<Item = Deferred<A, V>>) -> Self {
        Deferred::Sequence(items.into_iter().collect())
    }

    /// A labeled batch.
    pub fn keyed<K: Into<String>>(entries: impl IntoIterator<Item = (K, Deferred<A, V>)>) -> Self {
        Deferred::Keyed(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An ordered batch of concrete actions.
    pub fn actions(actions: impl IntoIterator<Item = A>) -> Self {
        Deferred::Sequence(actions.into_iter().map(Deferred::Action).collect())
    }

    /// A resumable computation.
    pub fn computation<C>(computation: C) -> Self
    where
        C: Computation<A, V> + 'static,
    {
        Deferred::Computation(Box::new(computation))
    }

    /// A pull-sequence.
    pub fn pull<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Deferred<A, V>>,
        I::IntoIter: Send + 'static,
    {
        Deferred::Pull(Box::new(iter.into_iter()))
    }

    /// A mappable container.
    pub fn mappable<M>(container: M) -> Self
    where
        M: Mappable<A, V> + 'static,
    {
        Deferred::Mappable(Box::new(container))
    }

    /// A pending value.
    pub fn future<F>(fut: F) -> Self
    where
        F: std::future::Future<Output = Result<V, Failure>> + Send + 'static,
    {
        Deferred::Future(Box::pin(fut))
    }

    /// A lazily produced value.
    pub fn thunk<F>(f: F) -> Self
    where
        F: FnOnce() -> Outcome<V> + Send + 'static,
    {
        Deferred::Thunk(Box::new(f))
    }

    /// An already resolved value.
    pub fn ready(value: V) -> Self
    where
        V: Send + 'static,
    {
        Deferred::Future(Box::pin(futures::future::ready(Ok(value))))
    }

    /// Strip action-creator tags, reporting whether there were any.
    pub fn untag(self) -> (Self, bool) {
        let mut effect = self;
        let mut tagged = false;
        loop {
            match effect {
                Deferred::Tagged(inner) => {
                    effect = *inner;
                    tagged = true;
                }
                other => return (other, tagged),
            }
        }
    }
}

/// Tag `payload` as a deferred effect.
///
/// The tag forces the middleware to resolve the payload even when it is a
/// plain action, which it would otherwise forward to the next handler.
///
/// # Example
///
/// ```
/// use flo::{classify, flo, Deferred, EffectKind, Resolved};
///
/// let tagged: Deferred<&str, Resolved<&str>> = flo(Deferred::action("save"));
/// let classified = classify(&tagged);
/// assert!(classified.tagged);
/// assert_eq!(classified.kind, EffectKind::Action);
/// ```
pub fn flo<A, V>(payload: Deferred<A, V>) -> Deferred<A, V> {
    Deferred::Tagged(Box::new(payload))
}

impl<A: fmt::Debug, V> fmt::Debug for Deferred<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Action(action) => f.debug_tuple("Action").field(action).finish(),
            Deferred::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            Deferred::Keyed(entries) => f.debug_tuple("Keyed").field(entries).finish(),
            Deferred::Computation(_) => f.write_str("Computation(<computation>)"),
            Deferred::Pull(_) => f.write_str("Pull(<iterator>)"),
            Deferred::Mappable(_) => f.write_str("Mappable(<container>)"),
            Deferred::Future(_) => f.write_str("Future(<future>)"),
            Deferred::Thunk(_) => f.write_str("Thunk(<function>)"),
            Deferred::Tagged(payload) => f
                .debug_struct("Tagged")
                .field("type", &FLO)
                .field("payload", payload)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Resolved;

    type Effect = Deferred<&'static str, Resolved<&'static str>>;

    #[test]
    fn test_untag_strips_every_layer() {
        let effect: Effect = flo(flo(Deferred::action("go")));
        let (inner, tagged) = effect.untag();
        assert!(tagged);
        assert!(matches!(inner, Deferred::Action("go")));
    }

    #[test]
    fn test_untag_untagged() {
        let effect: Effect = Deferred::action("go");
        let (inner, tagged) = effect.untag();
        assert!(!tagged);
        assert!(matches!(inner, Deferred::Action("go")));
    }

    #[test]
    fn test_keyed_constructor_keeps_labels() {
        let effect: Effect = Deferred::keyed(vec![("a", Deferred::action("x"))]);
        match effect {
            Deferred::Keyed(entries) => {
                assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["a"]);
            }
            other => panic!("expected Keyed, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_shows_tag() {
        let effect: Effect = flo(Deferred::actions(vec!["a", "b"]));
        let rendered = format!("{:?}", effect);
        assert!(rendered.contains("FLO"));
        assert!(rendered.contains("\"a\""));
    }
}
