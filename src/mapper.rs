//! Structural mapping over batches.
//!
//! [`map`] applies a transform to every member of a container and keeps the
//! container's shape: a sequence stays a sequence with the same indices, a
//! keyed batch keeps its labels, and a [`Mappable`] container does whatever
//! its own `map` does. [`join`] then waits for every member and assembles
//! the resolved shape.
//!
//! Members are started together and awaited concurrently. Nothing orders
//! them relative to each other.

use std::collections::BTreeMap;
use std::fmt;

use futures::future::{try_join_all, FutureExt, TryFutureExt};

use crate::deferred::{Deferred, Mappable, Transform};
use crate::outcome::{to_future, Outcome, Resolution};
use crate::shape::Assemble;

/// A deferred effect that the structural mapper can decompose.
pub enum Container<A, V> {
    /// An ordered batch.
    Sequence(Vec<Deferred<A, V>>),
    /// A labeled batch.
    Keyed(BTreeMap<String, Deferred<A, V>>),
    /// A container that maps itself.
    Mappable(Box<dyn Mappable<A, V>>),
}

impl<A, V> Container<A, V> {
    /// Take the container out of a deferred effect.
    ///
    /// Returns the effect unchanged when it is not a container.
    pub fn from_deferred(effect: Deferred<A, V>) -> Result<Self, Deferred<A, V>> {
        match effect {
            Deferred::Sequence(items) => Ok(Container::Sequence(items)),
            Deferred::Keyed(entries) => Ok(Container::Keyed(entries)),
            Deferred::Mappable(container) => Ok(Container::Mappable(container)),
            other => Err(other),
        }
    }
}

impl<A, V> fmt::Debug for Container<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Container::Sequence(items) => write!(f, "Sequence(len = {})", items.len()),
            Container::Keyed(entries) => f
                .debug_tuple("Keyed")
                .field(&entries.keys().collect::<Vec<_>>())
                .finish(),
            Container::Mappable(_) => f.write_str("Mappable(<container>)"),
        }
    }
}

/// A container whose members have been handed to the transform.
pub enum Mapped<V> {
    /// One pending result per sequence member, in order.
    Sequence(Vec<Resolution<V>>),
    /// One pending result per label.
    Keyed(Vec<(String, Resolution<V>)>),
    /// What a mappable container returned from its own `map`.
    Delegated(Outcome<V>),
}

impl<V> fmt::Debug for Mapped<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mapped::Sequence(items) => write!(f, "Sequence(len = {})", items.len()),
            Mapped::Keyed(entries) => f
                .debug_tuple("Keyed")
                .field(&entries.iter().map(|(k, _)| k).collect::<Vec<_>>())
                .finish(),
            Mapped::Delegated(_) => f.write_str("Delegated(<outcome>)"),
        }
    }
}

/// Apply `transform` to every member of `container`, keeping its shape.
///
/// The only side effects are those of `transform` itself.
pub fn map<A, V>(transform: Transform<A, V>, container: Container<A, V>) -> Mapped<V> {
    match container {
        Container::Sequence(items) => {
            Mapped::Sequence(items.into_iter().map(|item| transform(item)).collect())
        }
        Container::Keyed(entries) => Mapped::Keyed(
            entries
                .into_iter()
                .map(|(label, item)| {
                    let pending = transform(item);
                    (label, pending)
                })
                .collect(),
        ),
        Container::Mappable(container) => Mapped::Delegated(container.map(transform)),
    }
}

/// Wait for every member of a mapped container and assemble the result.
///
/// Fails with the first member failure; the members still pending are
/// dropped.
pub fn join<V>(mapped: Mapped<V>) -> Resolution<V>
where
    V: Assemble + Send + 'static,
{
    match mapped {
        Mapped::Sequence(pending) => try_join_all(pending).map_ok(V::sequence).boxed(),
        Mapped::Keyed(entries) => {
            let (labels, pending): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
            try_join_all(pending)
                .map_ok(move |values| V::keyed(labels.into_iter().zip(values).collect()))
                .boxed()
        }
        Mapped::Delegated(outcome) => to_future(outcome),
    }
}

/// A mappable record of labeled fields.
///
/// Mapping applies the transform to every field and assembles a keyed
/// result. Unlike a keyed batch, fields keep insertion order while they are
/// being built and a label may be replaced by a later [`with`](Fields::with).
///
/// # Example
///
/// ```
/// use flo::{Deferred, Fields, Resolved};
///
/// let record: Fields<&str, Resolved<&str>> = Fields::new(Vec::<(String, _)>::new())
///     .with("user", Deferred::action("load_user"))
///     .with("feed", Deferred::action("load_feed"));
/// assert_eq!(record.len(), 2);
/// let effect = Deferred::mappable(record);
/// # let _ = effect;
/// ```
pub struct Fields<A, V> {
    fields: Vec<(String, Deferred<A, V>)>,
}

impl<A, V> Fields<A, V> {
    /// Build a record from labeled effects.
    pub fn new<K: Into<String>>(fields: impl IntoIterator<Item = (K, Deferred<A, V>)>) -> Self {
        let mut record = Fields { fields: Vec::new() };
        for (label, effect) in fields {
            record = record.with(label, effect);
        }
        record
    }

    /// Add a field, replacing any field with the same label.
    pub fn with(mut self, label: impl Into<String>, effect: Deferred<A, V>) -> Self {
        let label = label.into();
        self.fields.retain(|(existing, _)| *existing != label);
        self.fields.push((label, effect));
        self
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<A, V> fmt::Debug for Fields<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fields")
            .field(&self.fields.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

impl<A, V> Mappable<A, V> for Fields<A, V>
where
    A: Send,
    V: Assemble + Send + 'static,
{
    fn map(self: Box<Self>, transform: Transform<A, V>) -> Outcome<V> {
        let entries = self
            .fields
            .into_iter()
            .map(|(label, effect)| {
                let pending = transform(effect);
                (label, pending)
            })
            .collect();
        Outcome::Pending(join(Mapped::Keyed(entries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::Failure;
    use crate::shape::Resolved;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Effect = Deferred<u64, Resolved<u64>>;

    /// Dispatch-like transform: resolves an action after sleeping that many
    /// milliseconds, recording completion order.
    fn sleeping(order: Arc<Mutex<Vec<u64>>>) -> Transform<u64, Resolved<u64>> {
        Arc::new(move |effect: Effect| {
            let order = order.clone();
            async move {
                match effect {
                    Deferred::Action(ms) => {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        order.lock().unwrap().push(ms);
                        Ok(Resolved::Value(ms * 10))
                    }
                    other => Err(Failure::Misuse(format!("unexpected {:?}", other))),
                }
            }
            .boxed()
        })
    }

    fn failing_on(bad: u64) -> Transform<u64, Resolved<u64>> {
        Arc::new(move |effect: Effect| {
            async move {
                match effect {
                    Deferred::Action(n) if n == bad => Err(Failure::value(n)),
                    Deferred::Action(n) => Ok(Resolved::Value(n)),
                    _ => Err(Failure::Misuse("not an action".into())),
                }
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_sequence_keeps_index_alignment() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let container = Container::Sequence(vec![
            Deferred::Action(30),
            Deferred::Action(1),
            Deferred::Action(15),
        ]);

        let result = join(map(sleeping(order.clone()), container)).await;

        assert_eq!(result, Ok(Resolved::sequence_of(vec![300, 10, 150])));
        assert_eq!(*order.lock().unwrap(), vec![1, 15, 30]);
    }

    #[tokio::test]
    async fn test_keyed_keeps_labels() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut entries = BTreeMap::new();
        entries.insert("slow".to_string(), Deferred::Action(20));
        entries.insert("fast".to_string(), Deferred::Action(2));

        let result = join(map(sleeping(order), Container::Keyed(entries))).await;

        assert_eq!(
            result,
            Ok(Resolved::keyed_of(vec![("slow", 200), ("fast", 20)]))
        );
    }

    #[tokio::test]
    async fn test_empty_batches_resolve_empty() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let seq = join(map(sleeping(order.clone()), Container::Sequence(vec![]))).await;
        let keyed = join(map(sleeping(order), Container::Keyed(BTreeMap::new()))).await;

        assert_eq!(seq, Ok(Resolved::Sequence(vec![])));
        assert_eq!(keyed, Ok(Resolved::Keyed(BTreeMap::new())));
    }

    #[tokio::test]
    async fn test_member_failure_fails_batch() {
        let container = Container::Sequence(vec![
            Deferred::Action(1),
            Deferred::Action(2),
            Deferred::Action(3),
        ]);

        let result = join(map(failing_on(2), container)).await;
        assert_eq!(result, Err(Failure::value(2)));
    }

    #[tokio::test]
    async fn test_mappable_delegates_to_its_own_map() {
        let record: Fields<u64, Resolved<u64>> = Fields::new(vec![("a", Deferred::Action(1))])
            .with("b", Deferred::Action(2))
            .with("a", Deferred::Action(3));

        let mapped = map(failing_on(99), Container::Mappable(Box::new(record)));
        assert!(matches!(mapped, Mapped::Delegated(_)));
        assert_eq!(
            join(mapped).await,
            Ok(Resolved::keyed_of(vec![("a", 3), ("b", 2)]))
        );
    }

    #[test]
    fn test_from_deferred_rejects_non_containers() {
        assert!(Container::from_deferred(Effect::Action(1)).is_err());
        assert!(Container::from_deferred(Effect::actions(vec![1])).is_ok());
    }
}
