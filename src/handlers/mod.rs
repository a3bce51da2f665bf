//! Handler functions invoked for delivered errors.
//!
//! Anything callable with an `&ErrorEntry` is a handler. Two reference
//! handlers are provided: [`Logger`] writes the error to a sink, and
//! [`PanicRecover`] raises the error as a panic and contains it on the spot.

use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind, panic_any},
    sync::Arc,
};

use crate::buffer::ErrorEntry;

pub mod sink;

pub use sink::{LogSink, MemorySink, Severity, TracingSink};

/// A side-effecting callable run for each delivered error.
pub trait ErrorHandler: Send + Sync {
    /// Handles one error.
    fn handle(&self, error: &ErrorEntry);
}

impl<F> ErrorHandler for F
where
    F: Fn(&ErrorEntry) + Send + Sync,
{
    fn handle(&self, error: &ErrorEntry) {
        self(error)
    }
}

/// Shared, type-erased handler as stored in a handler chain.
pub type SharedHandler = Arc<dyn ErrorHandler>;

/// Wraps a handler for registration in a chain.
pub fn shared<H: ErrorHandler + 'static>(handler: H) -> SharedHandler {
    Arc::new(handler)
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Handler that writes each error's message to a sink.
///
/// Never mutates collection state and never fails.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Logger {
    /// Creates a logger writing to `sink`.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl ErrorHandler for Logger {
    fn handle(&self, error: &ErrorEntry) {
        self.sink.write(Severity::Error, &error.to_string());
    }
}

/// Handler that raises the error as a panic and recovers from it.
///
/// The observable effect matches [`Logger`], except the line records the
/// recovered panic. Useful as a template for handlers that call into code
/// which signals failure by panicking.
#[derive(Clone)]
pub struct PanicRecover {
    sink: Arc<dyn LogSink>,
}

impl PanicRecover {
    /// Creates a handler reporting recovered panics to `sink`.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl Default for PanicRecover {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl ErrorHandler for PanicRecover {
    fn handle(&self, error: &ErrorEntry) {
        let message = error.to_string();
        let outcome: Result<(), _> = catch_unwind(AssertUnwindSafe(|| panic_any(message)));
        if let Err(payload) = outcome {
            self.sink.write(
                Severity::Warn,
                &format!("panic and recover, because of: {}", panic_message(&*payload)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        panic::Location,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering::SeqCst},
        },
    };

    use anyhow::anyhow;

    use crate::{
        buffer::ErrorEntry,
        handlers::{
            ErrorHandler, Logger, MemorySink, PanicRecover, Severity, panic_message, shared,
        },
    };

    fn entry(message: &str) -> ErrorEntry {
        ErrorEntry::new(anyhow!(message.to_string()), Location::caller(), 0)
    }

    #[test]
    fn test_closure_is_a_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = shared(move |_: &ErrorEntry| {
            counter.fetch_add(1, SeqCst);
        });

        handler.handle(&entry("one"));
        handler.handle(&entry("two"));
        assert_eq!(calls.load(SeqCst), 2);
    }

    #[test]
    fn test_logger_writes_message() {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new(sink.clone());

        logger.handle(&entry("disk full"));

        assert_eq!(
            sink.records(),
            vec![(Severity::Error, "disk full".to_string())]
        );
    }

    #[test]
    fn test_panic_recover_contains_panic() {
        let sink = Arc::new(MemorySink::new());
        let handler = PanicRecover::new(sink.clone());

        handler.handle(&entry("bad state"));
        handler.handle(&entry("worse state"));

        assert_eq!(
            sink.messages(),
            vec![
                "panic and recover, because of: bad state",
                "panic and recover, because of: worse state",
            ]
        );
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn std::any::Any + Send> = Box::new("owned".to_string());
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("static");
        let other: Box<dyn std::any::Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*borrowed), "static");
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }
}
