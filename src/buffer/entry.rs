//! Buffered error values.

use std::{
    error::Error as StdError,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    panic::Location,
    sync::Arc,
};

use anyhow::Error;

/// An error captured by a collection.
///
/// The entry is a cheap handle around the original error: cloning it shares
/// the same underlying value. It also remembers where it was produced and the
/// order in which the owning collection received it.
#[derive(Clone)]
pub struct ErrorEntry {
    /// The captured error.
    error: Arc<Error>,
    /// Source location of the producer that reported the error.
    origin: &'static Location<'static>,
    /// Arrival number within the owning collection.
    sequence: u64,
}

impl ErrorEntry {
    /// Creates a new entry.
    ///
    /// # Arguments
    ///
    /// * `error` - The error to capture.
    /// * `origin` - Location of the producer.
    /// * `sequence` - Arrival number assigned by the collection.
    ///
    /// # Returns
    ///
    /// A new `ErrorEntry`.
    pub fn new(error: Error, origin: &'static Location<'static>, sequence: u64) -> Self {
        Self {
            error: Arc::new(error),
            origin,
            sequence,
        }
    }

    /// Gets the captured error.
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Gets the location the error was reported from.
    pub fn origin(&self) -> &'static Location<'static> {
        self.origin
    }

    /// Gets the arrival number assigned by the collection.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Gets the top-level error message.
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl Display for ErrorEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if f.alternate() {
            write!(f, "{:#} (at {})", self.error, self.origin)
        } else {
            write!(f, "{}", self.error)
        }
    }
}

impl Debug for ErrorEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ErrorEntry")
            .field("error", &self.error)
            .field("origin", &self.origin)
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl StdError for ErrorEntry {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}
