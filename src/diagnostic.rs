//! Diagnostic output for unhandled failures.
//!
//! The default error handler writes a human-readable report of the failure
//! to a [`DiagnosticSink`] before rejecting. The sink is the only place the
//! engine produces output on its own.

use std::fmt;

use crate::failure::Failure;

/// Destination for pre-formatted, multi-line failure reports.
pub trait DiagnosticSink: Send + Sync {
    /// Write one report.
    fn report(&self, text: &str);
}

/// Writes reports to standard error.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&self, text: &str) {
        eprintln!("{}", text);
    }
}

/// Emits reports as `tracing` error events.
///
/// When no subscriber is interested in error events from this crate, the
/// report goes to the fallback sink instead, [`StderrSink`] by default.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink<F = StderrSink> {
    fallback: F,
}

#[cfg(feature = "tracing")]
impl<F: DiagnosticSink> TracingSink<F> {
    /// Send reports nobody subscribes to through `fallback`.
    pub fn with_fallback(fallback: F) -> Self {
        TracingSink { fallback }
    }
}

#[cfg(feature = "tracing")]
impl<F: DiagnosticSink> DiagnosticSink for TracingSink<F> {
    fn report(&self, text: &str) {
        if tracing::enabled!(tracing::Level::ERROR) {
            tracing::error!(report = %text, "deferred effect failed");
        } else {
            self.fallback.report(text);
        }
    }
}

/// The sink used when none is configured.
///
/// Tracing events when the `tracing` feature is enabled, falling back to
/// standard error without a subscriber. Standard error otherwise.
#[cfg(feature = "tracing")]
pub type DefaultSink = TracingSink;

/// The sink used when none is configured.
///
/// Tracing events when the `tracing` feature is enabled, standard error
/// otherwise.
#[cfg(not(feature = "tracing"))]
pub type DefaultSink = StderrSink;

/// Human-readable report of a failure.
///
/// ```text
/// flo: deferred effect failed
///   Error: loading profile
///     caused by: file not found
/// ```
///
/// # Examples
///
/// ```
/// use flo::diagnostic::Report;
/// use flo::Failure;
///
/// let report = Report(&Failure::message("disk full")).to_string();
/// assert_eq!(report.lines().nth(1), Some("  Error: disk full"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Report<'a>(pub &'a Failure);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flo: deferred effect failed")?;
        write!(f, "\n  Error: {}", self.0)?;
        for cause in self.0.trace() {
            write!(f, "\n    caused by: {}", cause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "loading profile")
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_report_without_trace() {
        let output = Report(&Failure::value("boom").into_error_like()).to_string();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "flo: deferred effect failed");
        assert!(lines[1].contains("boom"));
    }

    #[test]
    fn test_report_with_trace() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let output = Report(&Failure::error(Wrapped(io))).to_string();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "  Error: loading profile");
        assert_eq!(lines[2], "    caused by: file not found");
    }

    #[cfg(feature = "tracing")]
    #[test]
    #[tracing_test::traced_test]
    fn test_tracing_sink_emits_error_event() {
        let fallback = crate::testing::MemorySink::new();
        TracingSink::with_fallback(fallback.clone()).report("flo: deferred effect failed");
        assert!(logs_contain("deferred effect failed"));
        assert!(fallback.reports().is_empty());
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn test_tracing_sink_falls_back_without_subscriber() {
        let fallback = crate::testing::MemorySink::new();
        let sink = TracingSink::with_fallback(fallback.clone());

        tracing::subscriber::with_default(tracing::subscriber::NoSubscriber::default(), || {
            sink.report("flo: deferred effect failed");
        });

        assert_eq!(fallback.reports(), vec!["flo: deferred effect failed"]);
    }
}
