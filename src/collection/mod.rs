//! The error collection: a shared buffer, a handler chain, and the sessions
//! that deliver buffered errors to handlers.
//!
//! Producers call [`ErrorCollection::add`] from anywhere. A supervisor starts
//! a session with [`ErrorCollection::handle`] or
//! [`ErrorCollection::handle_chain`]; the session spawns a dispatch loop that
//! drains the buffer into a single-slot conduit and a runner that invokes
//! handlers for each delivered error. [`ErrorCollection::close_handles`] stops
//! both tasks and may be called any number of times.


mod dispatch;
mod runner;
pub mod session;

use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter, Result as FmtResult},
    panic::{AssertUnwindSafe, Location, catch_unwind},
    sync::Arc,
};

use {
    anyhow::Error,
    async_channel::{Receiver, bounded},
    parking_lot::Mutex,
    tokio::{runtime::Handle, sync::watch},
    tracing::{debug, warn},
};

use crate::{
    buffer::{ErrorBuffer, ErrorEntry},
    config::CollectionConfig,
    error::domain::{CollectionError, Result},
    handlers::{ErrorHandler, LogSink, Logger, Severity, SharedHandler, TracingSink, panic_message},
};

pub use session::SessionState;

use {
    dispatch::{dispatch_loop, monitor_loop},
    runner::{Delivery, run_handlers},
    session::Session,
};

/// State guarded by the collection lock.
struct CollectionState {
    /// Buffered errors; replaced wholesale by `clear`.
    buffer: Arc<ErrorBuffer>,
    /// Handlers in registration order.
    chain: Vec<SharedHandler>,
    /// Arrival number for the next added error.
    next_sequence: u64,
    session: Session,
}

/// Data shared between a collection's handles and its background tasks.
pub(crate) struct Shared {
    state: Mutex<CollectionState>,
    /// Bumped after every buffer mutation.
    changes: watch::Sender<u64>,
    sink: Arc<dyn LogSink>,
    config: CollectionConfig,
}

impl Shared {
    fn notify_change(&self) {
        self.changes.send_modify(|count| *count = count.wrapping_add(1));
    }

    fn push(&self, error: Error, origin: &'static Location<'static>) {
        {
            let mut state = self.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.buffer.push(ErrorEntry::new(error, origin, sequence));
        }
        self.notify_change();
    }

    pub(crate) fn pop_entry(&self) -> Option<ErrorEntry> {
        let entry = self.state.lock().buffer.pop();
        if entry.is_some() {
            self.notify_change();
        }
        entry
    }

    pub(crate) fn peek_entry(&self) -> Option<ErrorEntry> {
        self.state.lock().buffer.peek_head()
    }

    pub(crate) fn requeue(&self, entry: ErrorEntry) {
        self.state.lock().buffer.requeue(entry);
        self.notify_change();
    }

    pub(crate) fn chain_snapshot(&self) -> Vec<SharedHandler> {
        self.state.lock().chain.clone()
    }

    pub(crate) fn end_session(&self, generation: u64) -> bool {
        self.state.lock().session.end(generation)
    }

    pub(crate) fn sink(&self) -> &dyn LogSink {
        &*self.sink
    }
}

/// Buffer of errors reported by an application, with handler dispatch.
///
/// Cloning the collection yields another handle to the same buffer, chain and
/// session.
#[derive(Clone)]
pub struct ErrorCollection {
    shared: Arc<Shared>,
}

impl ErrorCollection {
    /// Creates an empty collection with no handlers.
    ///
    /// # Arguments
    ///
    /// * `capacity_hint` - Initial buffer allocation; the buffer grows past it.
    ///
    /// # Returns
    ///
    /// A new `ErrorCollection` reporting its own faults through `tracing`.
    #[must_use]
    pub fn new(capacity_hint: usize) -> Self {
        Self::build(
            CollectionConfig::with_capacity_hint(capacity_hint),
            Arc::new(TracingSink),
        )
    }

    /// Creates an empty collection from validated settings.
    ///
    /// # Arguments
    ///
    /// * `config` - Collection settings.
    /// * `sink` - Sink receiving the collection's own fault reports.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::Config` if `config` is invalid.
    pub fn with_config(config: CollectionConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, sink))
    }

    /// Creates a collection with the built-in [`Logger`] registered.
    ///
    /// Both the logger and the collection's fault reports write to `sink`.
    #[must_use]
    pub fn with_logger(sink: Arc<dyn LogSink>) -> Self {
        let collection = Self::build(CollectionConfig::default(), Arc::clone(&sink));
        collection.add_handler(Logger::new(sink));
        collection
    }

    fn build(config: CollectionConfig, sink: Arc<dyn LogSink>) -> Self {
        let (changes, _) = watch::channel(0);
        let state = CollectionState {
            buffer: Arc::new(ErrorBuffer::with_capacity(config.capacity_hint)),
            chain: Vec::new(),
            next_sequence: 0,
            session: Session::new(),
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                changes,
                sink,
                config,
            }),
        }
    }

    /// Gets the settings the collection was created with.
    pub fn config(&self) -> &CollectionConfig {
        &self.shared.config
    }

    /// Adds an error at the tail of the buffer.
    ///
    /// Never blocks for longer than the collection lock is held and never
    /// panics: a panic raised while storing the error is recovered and
    /// reported to the sink. The entry records the caller's location.
    #[track_caller]
    pub fn add(&self, error: impl Into<Error>) {
        let origin = Location::caller();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.shared.push(error.into(), origin);
        }));
        if let Err(payload) = outcome {
            self.shared.sink.write(
                Severity::Warn,
                &format!("catch a panic while adding error: {}", panic_message(&*payload)),
            );
        }
    }

    /// Removes and returns the head error, or `None` when empty.
    ///
    /// The returned entry keeps the location it was added from; format it
    /// with `{:#}` to include that location.
    pub fn pop(&self) -> Option<ErrorEntry> {
        self.shared.pop_entry()
    }

    /// Returns the head error without removing it, or `None` when empty.
    pub fn get_error(&self) -> Option<ErrorEntry> {
        self.shared.peek_entry()
    }

    /// Number of buffered errors as last published by a mutation.
    pub fn length(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    /// Number of buffered errors, read under the buffer's own lock.
    pub fn safe_length(&self) -> usize {
        self.shared.state.lock().buffer.safe_len()
    }

    /// Whether no errors are buffered.
    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// Runs a read-only composite operation over the buffered errors.
    ///
    /// No error can be added or removed while `f` runs.
    pub fn inspect<R>(&self, f: impl FnOnce(&VecDeque<ErrorEntry>) -> R) -> R {
        let state = self.shared.state.lock();
        state.buffer.inspect(f)
    }

    /// Discards every buffered error.
    ///
    /// An error already handed to the delivery conduit is still delivered.
    pub fn clear(&self) {
        {
            let mut state = self.shared.state.lock();
            state.buffer = Arc::new(ErrorBuffer::with_capacity(
                self.shared.config.clear_capacity_hint,
            ));
        }
        self.shared.notify_change();
    }

    /// Appends a handler to the chain.
    pub fn add_handler<H: ErrorHandler + 'static>(&self, handler: H) {
        self.shared.state.lock().chain.push(Arc::new(handler));
    }

    /// Appends several handlers to the chain, keeping their order.
    pub fn add_handlers<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = SharedHandler>,
    {
        self.shared.state.lock().chain.extend(handlers);
    }

    /// Number of handlers in the chain.
    pub fn handler_count(&self) -> usize {
        self.shared.state.lock().chain.len()
    }

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        self.shared.state.lock().session.state()
    }

    /// Starts a session that runs `handler` on every delivered error.
    ///
    /// The handler is not added to the chain.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::SessionAlreadyRunning` if a session is
    /// active, or `CollectionError::NoRuntime` outside a Tokio runtime.
    pub fn handle<H: ErrorHandler + 'static>(&self, handler: H) -> Result<()> {
        self.start_session(Some(Delivery::Single(Arc::new(handler))))
            .map(|_| ())
    }

    /// Starts a session that runs the whole chain on every delivered error.
    ///
    /// Handlers run in registration order, one error at a time. Handlers
    /// added while the session runs take part from the next delivery on.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::SessionAlreadyRunning` if a session is
    /// active, or `CollectionError::NoRuntime` outside a Tokio runtime.
    pub fn handle_chain(&self) -> Result<()> {
        self.start_session(Some(Delivery::Chain)).map(|_| ())
    }

    /// Starts a session that only drains the buffer, returning the conduit.
    ///
    /// Errors are removed from the buffer as they are delivered. Dropping the
    /// receiver ends the session at the next delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::SessionAlreadyRunning` if a session is
    /// active, or `CollectionError::NoRuntime` outside a Tokio runtime.
    pub fn catch_error(&self) -> Result<Receiver<ErrorEntry>> {
        self.start_session(None)
    }

    /// Starts a monitor reporting each new head error without removing it.
    ///
    /// Monitors have their own conduit and may run alongside a session and
    /// each other. A monitor ends on `close_handles` or once its receiver is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::NoRuntime` outside a Tokio runtime.
    pub fn has_error(&self) -> Result<Receiver<ErrorEntry>> {
        let runtime = current_runtime()?;
        let (tx, rx) = bounded(self.shared.config.monitor_capacity);

        let mut state = self.shared.state.lock();
        let stop = state.session.listener();
        let task = runtime.spawn(monitor_loop(
            Arc::clone(&self.shared),
            stop,
            self.shared.changes.subscribe(),
            tx,
        ));
        state.session.track(task);

        Ok(rx)
    }

    fn start_session(&self, delivery: Option<Delivery>) -> Result<Receiver<ErrorEntry>> {
        let runtime = current_runtime()?;
        let (tx, rx) = bounded(self.shared.config.delivery_capacity);

        let mut state = self.shared.state.lock();
        let (stop, generation) = state.session.begin()?;

        let dispatch = runtime.spawn(dispatch_loop(
            Arc::clone(&self.shared),
            stop.clone(),
            self.shared.changes.subscribe(),
            tx,
            generation,
        ));
        state.session.track(dispatch);

        if let Some(delivery) = delivery {
            let runner = runtime.spawn(run_handlers(
                Arc::clone(&self.shared),
                stop,
                rx.clone(),
                delivery,
                generation,
            ));
            state.session.track(runner);
        }

        Ok(rx)
    }

    /// Stops the running session and every monitor.
    ///
    /// Background tasks notice within one scheduling step. Safe to call any
    /// number of times.
    ///
    /// # Returns
    ///
    /// `true` if a running session was stopped, `false` if none was running.
    pub fn close_handles(&self) -> bool {
        let closed = self.shared.state.lock().session.close();
        if !closed {
            debug!("close_handles called with no running session");
        }
        closed
    }

    /// Stops the session like [`close_handles`] and waits for every
    /// background task to exit.
    ///
    /// [`close_handles`]: ErrorCollection::close_handles
    pub async fn shutdown(&self) -> bool {
        let (closed, tasks) = {
            let mut state = self.shared.state.lock();
            let closed = state.session.close();
            (closed, state.session.take_tasks())
        };

        for task in tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
        closed
    }
}

impl Default for ErrorCollection {
    /// Creates a collection with a [`Logger`] writing to `tracing`.
    fn default() -> Self {
        Self::with_logger(Arc::new(TracingSink))
    }
}

impl Debug for ErrorCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.shared.state.lock();
        f.debug_struct("ErrorCollection")
            .field("length", &state.buffer.len())
            .field("handlers", &state.chain.len())
            .field("session", &state.session.state())
            .finish()
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| CollectionError::NoRuntime {
        reason: e.to_string(),
    })
}
