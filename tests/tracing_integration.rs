//! Integration tests for the default diagnostic path under a `fmt` subscriber.

#![cfg(feature = "tracing")]

use std::io;
use std::sync::{Arc, Mutex};

use futures::executor::block_on;

use flo::coroutine::Coroutine;
use flo::{assert_rejected, Deferred, Failure, Flow, Outcome, Resolved};

/// Writer that appends formatted events to a shared buffer.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn subscriber(capture: &Capture) -> impl tracing::Subscriber + Send + Sync {
    let writer = capture.clone();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::ERROR)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish()
}

#[test]
fn default_error_report_is_a_tracing_event() {
    let capture = Capture::default();
    let handler = Flow::<Resolved<i32>>::new()
        .bind(|_: &'static str| Outcome::Failed(Failure::value("boom")))
        .next(|_: &'static str| ());

    let result = tracing::subscriber::with_default(subscriber(&capture), || {
        let co = Coroutine::new(|co| async move { co.suspend(Deferred::action("foo")).await });
        block_on(handler.handle(Deferred::computation(co)).into_resolving().unwrap())
    });

    assert_rejected!(result, Failure::TypeMismatch { .. });
    let output = capture.contents();
    assert!(output.contains("ERROR"));
    assert!(output.contains("deferred effect failed"));
    assert!(output.contains("boom"));
}

#[test]
fn custom_error_handler_emits_no_error_event() {
    let capture = Capture::default();
    let handler = Flow::new()
        .with_error_handler(|_| Ok(Resolved::Value(0)))
        .bind(|_: &'static str| Outcome::Failed(Failure::message("down")))
        .next(|_: &'static str| ());

    let result = tracing::subscriber::with_default(subscriber(&capture), || {
        block_on(
            handler
                .handle(Deferred::actions(vec!["a"]))
                .into_resolving()
                .unwrap(),
        )
    });

    assert_eq!(result, Ok(Resolved::Value(0)));
    assert!(capture.contents().is_empty());
}
