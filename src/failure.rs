//! The failure type that flows through the resolution engine.
//!
//! Every way a deferred effect can go wrong ends up as a [`Failure`]: a
//! dispatch that rejected, a nested computation that gave up, a future that
//! settled with an error. Failures are offered back to the computation that
//! yielded the effect before they reach the error handler, so the type has
//! to be cheap to clone and carry enough structure for the default handler
//! to tell error-like failures apart from plain thrown values.
//!
//! # Examples
//!
//! ```
//! use flo::Failure;
//!
//! let err = Failure::message("connection refused");
//! assert!(err.is_error_like());
//!
//! let raw = Failure::value("boom");
//! assert!(!raw.is_error_like());
//! assert_eq!(raw.to_string(), "boom");
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Shared, thread-safe error object carried by [`Failure::Error`].
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// A failure produced while resolving a deferred effect.
///
/// # Examples
///
/// ```
/// use flo::Failure;
///
/// let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
/// let failure = Failure::error(io);
/// assert_eq!(failure.to_string(), "missing");
/// ```
#[derive(Debug, Clone)]
pub enum Failure {
    /// An error-like failure: it has a message and a source chain.
    Error(SharedError),
    /// A failure value that is not an error object, kept in rendered form.
    Value(String),
    /// A failure whose payload did not have the expected type.
    TypeMismatch {
        /// What the receiver required.
        expected: String,
        /// Rendered form of what it actually got.
        found: String,
    },
    /// Nested resolution went deeper than the configured limit.
    DepthExceeded {
        /// The configured maximum depth.
        limit: usize,
    },
    /// The engine was used in a way it cannot support.
    Misuse(String),
}

impl Failure {
    /// Wrap an error object.
    pub fn error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Failure::Error(Arc::new(error))
    }

    /// Create an error-like failure from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        Failure::Error(Arc::new(Message(msg.into())))
    }

    /// Create a non-error failure from any displayable value.
    ///
    /// This is what a dispatch "throws" when it fails with something that is
    /// not an error object.
    pub fn value(value: impl fmt::Display) -> Self {
        Failure::Value(value.to_string())
    }

    /// Whether this failure behaves like an error object.
    ///
    /// Only [`Failure::Value`] is not error-like.
    pub fn is_error_like(&self) -> bool {
        !matches!(self, Failure::Value(_))
    }

    /// Convert a non-error failure into a [`Failure::TypeMismatch`].
    ///
    /// Error-like failures are returned unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use flo::Failure;
    ///
    /// let failure = Failure::value("boom").into_error_like();
    /// assert!(failure.is_error_like());
    /// assert!(failure.to_string().contains("boom"));
    /// ```
    pub fn into_error_like(self) -> Self {
        match self {
            Failure::Value(found) => Failure::TypeMismatch {
                expected: "an error value".to_string(),
                found: format!("{:?}", found),
            },
            other => other,
        }
    }

    /// The chain of underlying causes, outermost first.
    ///
    /// Empty unless this is a [`Failure::Error`] whose error has sources.
    pub fn trace(&self) -> Vec<String> {
        let mut trail = Vec::new();
        if let Failure::Error(err) = self {
            let mut source = err.source();
            while let Some(cause) = source {
                trail.push(cause.to_string());
                source = cause.source();
            }
        }
        trail
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Error(err) => write!(f, "{}", err),
            Failure::Value(value) => write!(f, "{}", value),
            Failure::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Failure::DepthExceeded { limit } => {
                write!(f, "deferred effect nested deeper than {} levels", limit)
            }
            Failure::Misuse(msg) => write!(f, "misuse: {}", msg),
        }
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Failure::Error(err) => err.source(),
            _ => None,
        }
    }
}

impl PartialEq for Failure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Failure::Error(a), Failure::Error(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            (Failure::Value(a), Failure::Value(b)) => a == b,
            (
                Failure::TypeMismatch {
                    expected: e1,
                    found: f1,
                },
                Failure::TypeMismatch {
                    expected: e2,
                    found: f2,
                },
            ) => e1 == e2 && f1 == f2,
            (Failure::DepthExceeded { limit: a }, Failure::DepthExceeded { limit: b }) => a == b,
            (Failure::Misuse(a), Failure::Misuse(b)) => a == b,
            _ => false,
        }
    }
}

/// Plain-message error used by [`Failure::message`].
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}
