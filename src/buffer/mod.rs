//! Thread-safe FIFO storage for captured errors.
//!
//! The buffer is the leaf of the crate: it knows nothing about handlers or
//! sessions and only keeps entries in arrival order.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering::SeqCst},
};

use parking_lot::Mutex;

pub mod entry;

pub use entry::ErrorEntry;

/// FIFO queue of error entries.
///
/// Every operation takes the buffer's own lock, so a buffer can be shared
/// between tasks without outside synchronization. The capacity given at
/// construction is only an allocation hint; the queue grows past it.
#[derive(Debug)]
pub struct ErrorBuffer {
    /// Queued entries, head first.
    entries: Mutex<VecDeque<ErrorEntry>>,
    /// Number of queued entries, readable without the lock.
    len: AtomicUsize,
}

impl ErrorBuffer {
    /// Creates an empty buffer.
    ///
    /// # Arguments
    ///
    /// * `capacity_hint` - Number of entries to allocate room for up front.
    ///
    /// # Returns
    ///
    /// A new `ErrorBuffer`.
    #[must_use]
    pub fn with_capacity(capacity_hint: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity_hint)),
            len: AtomicUsize::new(0),
        }
    }

    /// Appends an entry at the tail.
    pub fn push(&self, entry: ErrorEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        self.len.store(entries.len(), SeqCst);
    }

    /// Puts an entry back ahead of every entry added after it.
    ///
    /// Used when an entry was taken for delivery but could not be handed over.
    /// Entries returned out of order still end up in arrival order.
    pub fn requeue(&self, entry: ErrorEntry) {
        let mut entries = self.entries.lock();
        let at = entries.partition_point(|queued| queued.sequence() < entry.sequence());
        entries.insert(at, entry);
        self.len.store(entries.len(), SeqCst);
    }

    /// Removes and returns the head entry, or `None` when empty.
    pub fn pop(&self) -> Option<ErrorEntry> {
        let mut entries = self.entries.lock();
        let entry = entries.pop_front();
        self.len.store(entries.len(), SeqCst);
        entry
    }

    /// Returns the head entry without removing it.
    pub fn peek_head(&self) -> Option<ErrorEntry> {
        self.entries.lock().front().cloned()
    }

    /// Number of entries as last published by a mutation.
    ///
    /// Does not take the lock, so it may trail a push that is in progress.
    pub fn len(&self) -> usize {
        self.len.load(SeqCst)
    }

    /// Number of entries, read under the buffer lock.
    pub fn safe_len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the buffer currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs a read-only composite operation over the queued entries.
    ///
    /// The buffer lock is held for the duration of `f`, so every other
    /// buffer operation waits until it returns.
    pub fn inspect<R>(&self, f: impl FnOnce(&VecDeque<ErrorEntry>) -> R) -> R {
        f(&self.entries.lock())
    }
}

#[cfg(test)]
mod tests {
    use std::{panic::Location, sync::Arc, thread};

    use anyhow::anyhow;

    use crate::buffer::{ErrorBuffer, ErrorEntry};

    fn entry(message: &str, sequence: u64) -> ErrorEntry {
        ErrorEntry::new(anyhow!(message.to_string()), Location::caller(), sequence)
    }

    #[test]
    fn test_buffer_fifo_order() {
        let buffer = ErrorBuffer::with_capacity(2);
        for (i, message) in ["a", "b", "c"].into_iter().enumerate() {
            buffer.push(entry(message, i as u64));
        }

        // Capacity is only a hint
        assert_eq!(buffer.len(), 3);

        let popped: Vec<String> = std::iter::from_fn(|| buffer.pop())
            .map(|e| e.message())
            .collect();
        assert_eq!(popped, vec!["a", "b", "c"]);
        assert!(buffer.pop().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_buffer_peek_does_not_remove() {
        let buffer = ErrorBuffer::with_capacity(4);
        assert!(buffer.peek_head().is_none());

        buffer.push(entry("first", 0));
        buffer.push(entry("second", 1));

        let head = buffer.peek_head().map(|e| e.message());
        assert_eq!(head.as_deref(), Some("first"));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.safe_len(), 2);
    }

    #[test]
    fn test_buffer_requeue_restores_head() {
        let buffer = ErrorBuffer::with_capacity(4);
        buffer.push(entry("first", 0));
        buffer.push(entry("second", 1));

        let head = buffer.pop().unwrap();
        buffer.requeue(head);

        assert_eq!(buffer.pop().unwrap().message(), "first");
        assert_eq!(buffer.pop().unwrap().message(), "second");
    }

    #[test]
    fn test_buffer_requeue_keeps_arrival_order() {
        let buffer = ErrorBuffer::with_capacity(4);
        for (i, message) in ["first", "second", "third"].into_iter().enumerate() {
            buffer.push(entry(message, i as u64));
        }

        let first = buffer.pop().unwrap();
        let second = buffer.pop().unwrap();
        // The later entry comes back first
        buffer.requeue(second);
        buffer.requeue(first);

        let order: Vec<String> = std::iter::from_fn(|| buffer.pop())
            .map(|e| e.message())
            .collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_buffer_concurrent_push() {
        let buffer = Arc::new(ErrorBuffer::with_capacity(8));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..100 {
                        buffer.push(entry(&format!("{t}-{i}"), i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(buffer.safe_len(), 400);
        assert_eq!(buffer.len(), 400);
        assert_eq!(buffer.inspect(|entries| entries.len()), 400);
    }
}
