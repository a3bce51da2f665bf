//! Write-only log sinks used by the built-in handlers.

use std::fmt::{Display, Formatter, Result as FmtResult};

use {
    parking_lot::Mutex,
    tracing::{error, info, warn},
};

/// Severity attached to a sink record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Routine information.
    Info,
    /// A fault that was contained.
    Warn,
    /// A reported error.
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Destination for log lines written by handlers and by the collection.
///
/// Sinks are write-only and must not fail; a sink that cannot write drops
/// the record.
pub trait LogSink: Send + Sync {
    /// Writes a single record.
    fn write(&self, severity: Severity, message: &str);
}

/// Sink that forwards every record to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!(target: "errbox", "{message}"),
            Severity::Warn => warn!(target: "errbox", "{message}"),
            Severity::Error => error!(target: "errbox", "{message}"),
        }
    }
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Recorded lines in write order.
    records: Mutex<Vec<(Severity, String)>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a copy of every record written so far.
    pub fn records(&self) -> Vec<(Severity, String)> {
        self.records.lock().clone()
    }

    /// Gets the messages written so far, without severities.
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Counts records whose message equals `message`.
    pub fn count(&self, message: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|(_, m)| m == message)
            .count()
    }
}

impl LogSink for MemorySink {
    fn write(&self, severity: Severity, message: &str) {
        self.records.lock().push((severity, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::sink::{LogSink, MemorySink, Severity, TracingSink};

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.write(Severity::Error, "first");
        sink.write(Severity::Warn, "second");
        sink.write(Severity::Error, "first");

        assert_eq!(sink.messages(), vec!["first", "second", "first"]);
        assert_eq!(sink.count("first"), 2);
        assert_eq!(sink.records()[1], (Severity::Warn, "second".to_string()));
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        // No subscriber installed; records are dropped silently
        TracingSink.write(Severity::Info, "ignored");
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Warn.to_string(), "WARN");
    }
}
