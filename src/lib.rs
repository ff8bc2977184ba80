//! # Flo
//!
//! Dispatch-pipeline middleware that resolves deferred effects.
//!
//! An action pipeline normally carries plain actions. With this middleware
//! installed, a [`Deferred`] value can also carry:
//!
//! - a batch of effects, sequential or keyed, resolved concurrently;
//! - a resumable [`Computation`] that yields effects one at a time;
//! - a pull-sequence of effects resolved strictly in order;
//! - a [`Mappable`] container, a future, or a lazy thunk.
//!
//! Effects nest arbitrarily. Every concrete action found inside goes through
//! the pipeline's dispatch capability, and the middleware hands back a single
//! future for the fully resolved value, shaped like the effect.
//!
//! ## Quick Example
//!
//! ```rust
//! use flo::coroutine::Coroutine;
//! use flo::{Deferred, Flow, Outcome, Resolved};
//!
//! # tokio_test::block_on(async {
//! let handler = Flow::new()
//!     .bind(|url: &'static str| Outcome::Ready(Resolved::Value(url.len())))
//!     .next(|_: &'static str| ());
//!
//! let login = Coroutine::new(|co| async move {
//!     let pair = co.suspend(Deferred::actions(vec!["/user", "/prefs"])).await?;
//!     let last = co.suspend(Deferred::action("/session")).await?;
//!     Ok(Resolved::Sequence(vec![pair, last]))
//! });
//!
//! let result = handler
//!     .handle(Deferred::computation(login))
//!     .into_resolving()
//!     .unwrap()
//!     .await;
//!
//! assert_eq!(
//!     result,
//!     Ok(Resolved::Sequence(vec![
//!         Resolved::sequence_of(vec![5, 6]),
//!         Resolved::Value(8),
//!     ]))
//! );
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod classify;
pub mod coroutine;
pub mod deferred;
pub mod diagnostic;
pub mod driver;
pub mod failure;
pub mod mapper;
pub mod middleware;
pub mod outcome;
pub mod shape;
pub mod testing;

// Re-exports
pub use classify::{classify, Classified, EffectKind};
pub use coroutine::Coroutine;
pub use deferred::{flo, Computation, Deferred, Mappable, Step, Transform, FLO};
pub use diagnostic::DiagnosticSink;
pub use driver::{Dispatch, Driver};
pub use failure::Failure;
pub use mapper::Fields;
pub use middleware::{ActionHandler, Flow, Handled, NextHandler};
pub use outcome::{to_future, Outcome, Resolution};
pub use shape::{Assemble, Resolved};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coroutine::{from_fn, Coroutine, Input};
    pub use crate::deferred::{flo, Computation, Deferred, Mappable, Step};
    pub use crate::driver::{Dispatch, Driver};
    pub use crate::failure::Failure;
    pub use crate::mapper::Fields;
    pub use crate::middleware::{Flow, Handled};
    pub use crate::outcome::Outcome;
    pub use crate::shape::{Assemble, Resolved};
}
