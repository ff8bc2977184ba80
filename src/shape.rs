//! Shapes of resolved values.
//!
//! A batch resolves to a value with the same shape as the batch: a
//! sequential batch to a sequence, a keyed batch to a keyed map. The engine
//! is generic over the resolved value type, so it only asks that the type
//! can be [`Assemble`]d from those two shapes.
//!
//! [`Resolved`] is the value tree shipped with the crate. With the `serde`
//! feature, `serde_json::Value` works as well.

use std::collections::BTreeMap;

/// A value type that can hold the results of a batch.
pub trait Assemble: Sized {
    /// Build a value from resolved batch members, in batch order.
    fn sequence(items: Vec<Self>) -> Self;

    /// Build a value from resolved keyed-batch members.
    fn keyed(entries: BTreeMap<String, Self>) -> Self;
}

/// A resolved value tree mirroring the shape of the deferred effect.
///
/// # Examples
///
/// ```
/// use flo::Resolved;
///
/// let tree = Resolved::sequence_of(vec![200, 404]);
/// assert_eq!(tree.get_index(1), Some(&Resolved::Value(404)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(untagged))]
pub enum Resolved<T> {
    /// A single resolved value.
    Value(T),
    /// The result of a sequential batch.
    Sequence(Vec<Resolved<T>>),
    /// The result of a keyed batch.
    Keyed(BTreeMap<String, Resolved<T>>),
}

impl<T> Resolved<T> {
    /// Build a sequence of plain values.
    pub fn sequence_of(items: impl IntoIterator<Item = T>) -> Self {
        Resolved::Sequence(items.into_iter().map(Resolved::Value).collect())
    }

    /// Build a keyed map of plain values.
    pub fn keyed_of<K: Into<String>>(entries: impl IntoIterator<Item = (K, T)>) -> Self {
        Resolved::Keyed(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Resolved::Value(v)))
                .collect(),
        )
    }

    /// The leaf value, if this is one.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Resolved::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Consume and return the leaf value, if this is one.
    pub fn into_value(self) -> Option<T> {
        match self {
            Resolved::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Member `index` of a sequence.
    pub fn get_index(&self, index: usize) -> Option<&Resolved<T>> {
        match self {
            Resolved::Sequence(items) => items.get(index),
            _ => None,
        }
    }

    /// Member `key` of a keyed map.
    pub fn get(&self, key: &str) -> Option<&Resolved<T>> {
        match self {
            Resolved::Keyed(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Number of members for sequences and keyed maps; `None` for leaves.
    pub fn len(&self) -> Option<usize> {
        match self {
            Resolved::Value(_) => None,
            Resolved::Sequence(items) => Some(items.len()),
            Resolved::Keyed(entries) => Some(entries.len()),
        }
    }

    /// Whether this is an empty sequence or keyed map.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl<T> From<T> for Resolved<T> {
    fn from(value: T) -> Self {
        Resolved::Value(value)
    }
}

impl<T> Assemble for Resolved<T> {
    fn sequence(items: Vec<Self>) -> Self {
        Resolved::Sequence(items)
    }

    fn keyed(entries: BTreeMap<String, Self>) -> Self {
        Resolved::Keyed(entries)
    }
}

#[cfg(feature = "serde")]
impl Assemble for serde_json::Value {
    fn sequence(items: Vec<Self>) -> Self {
        serde_json::Value::Array(items)
    }

    fn keyed(entries: BTreeMap<String, Self>) -> Self {
        serde_json::Value::Object(entries.into_iter().collect())
    }
}
