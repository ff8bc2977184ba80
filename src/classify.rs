//! Action classification.
//!
//! [`classify`] assigns a [`Deferred`] to exactly one [`EffectKind`]. Checks
//! run in a fixed priority order: the action-creator tag first, then the
//! capability-bearing shapes from most to least specific, then the batch
//! shapes, and finally the concrete-action fallback.

use std::fmt;

use crate::deferred::Deferred;

/// The shape a deferred effect takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// A container with its own transform operation.
    Mappable,
    /// A resumable computation.
    Computation,
    /// A pull-sequence.
    Pull,
    /// An async future.
    Future,
    /// A zero-argument callable.
    Thunk,
    /// An ordered batch.
    Sequence,
    /// A labeled batch.
    Keyed,
    /// Not a deferred effect.
    Action,
}

impl EffectKind {
    /// Whether values of this kind need resolution before dispatch.
    pub fn is_deferred(self) -> bool {
        self != EffectKind::Action
    }

    /// Whether this kind is resolved by the structural mapper.
    pub fn is_batch(self) -> bool {
        matches!(self, EffectKind::Sequence | EffectKind::Keyed)
    }

    /// Short lowercase name, used in logs.
    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Mappable => "mappable",
            EffectKind::Computation => "computation",
            EffectKind::Pull => "pull",
            EffectKind::Future => "future",
            EffectKind::Thunk => "thunk",
            EffectKind::Sequence => "sequence",
            EffectKind::Keyed => "keyed",
            EffectKind::Action => "action",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of one deferred effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    /// The shape of the payload once tags are stripped.
    pub kind: EffectKind,
    /// Whether the value arrived wrapped in the action-creator tag.
    pub tagged: bool,
}

impl Classified {
    /// Whether the middleware must resolve this value instead of forwarding it.
    ///
    /// A tagged concrete action is resolved; an untagged one is forwarded.
    pub fn needs_resolution(self) -> bool {
        self.tagged || self.kind.is_deferred()
    }
}

/// Classify a deferred effect. Has no side effects.
///
/// # Examples
///
/// ```
/// use flo::{classify, Deferred, EffectKind, Resolved};
///
/// let batch: Deferred<&str, Resolved<&str>> = Deferred::actions(vec!["a", "b"]);
/// assert_eq!(classify(&batch).kind, EffectKind::Sequence);
///
/// let plain: Deferred<&str, Resolved<&str>> = Deferred::action("a");
/// assert!(!classify(&plain).needs_resolution());
/// ```
pub fn classify<A, V>(effect: &Deferred<A, V>) -> Classified {
    let mut current = effect;
    let mut tagged = false;
    while let Deferred::Tagged(payload) = current {
        current = &**payload;
        tagged = true;
    }

    Classified {
        kind: kind_of(current),
        tagged,
    }
}

fn kind_of<A, V>(effect: &Deferred<A, V>) -> EffectKind {
    match effect {
        Deferred::Mappable(_) => EffectKind::Mappable,
        Deferred::Computation(_) => EffectKind::Computation,
        Deferred::Pull(_) => EffectKind::Pull,
        Deferred::Future(_) => EffectKind::Future,
        Deferred::Thunk(_) => EffectKind::Thunk,
        Deferred::Sequence(_) => EffectKind::Sequence,
        Deferred::Keyed(_) => EffectKind::Keyed,
        Deferred::Action(_) => EffectKind::Action,
        Deferred::Tagged(_) => unreachable!("tags are stripped by classify"),
    }
}
