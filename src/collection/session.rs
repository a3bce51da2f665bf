//! Session bookkeeping and the stop signal observed by background tasks.

use {
    async_channel::{Receiver, Sender, bounded},
    tokio::task::JoinHandle,
    tracing::debug,
};

use crate::error::domain::CollectionError;

/// Lifecycle of a collection's dispatch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been started yet.
    Idle,
    /// Background tasks are draining the buffer.
    Running,
    /// The last session was closed.
    Stopped,
}

/// Closable broadcast used to stop background tasks.
///
/// Nothing is ever sent through the channel; closing it wakes every listener.
#[derive(Debug)]
pub(crate) struct StopSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl StopSignal {
    fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Closes the signal. Returns `false` if it was already closed.
    fn close(&self) -> bool {
        self.tx.close()
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn listener(&self) -> StopListener {
        StopListener {
            rx: self.rx.clone(),
        }
    }
}

/// Task-side view of a [`StopSignal`].
#[derive(Debug, Clone)]
pub(crate) struct StopListener {
    rx: Receiver<()>,
}

impl StopListener {
    /// Resolves once the signal is closed.
    pub(crate) async fn stopped(&self) {
        while self.rx.recv().await.is_ok() {}
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.rx.is_closed()
    }
}

/// Session state guarded by the collection lock.
#[derive(Debug)]
pub(crate) struct Session {
    state: SessionState,
    signal: StopSignal,
    /// Incremented on every session start.
    generation: u64,
    /// Background tasks spawned for this collection.
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::Idle,
            signal: StopSignal::new(),
            generation: 0,
            tasks: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    /// Starts a new session.
    ///
    /// # Returns
    ///
    /// The stop listener and generation number for the session's tasks.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::SessionAlreadyRunning` if a session is active.
    pub(crate) fn begin(&mut self) -> Result<(StopListener, u64), CollectionError> {
        if self.state == SessionState::Running {
            return Err(CollectionError::SessionAlreadyRunning);
        }
        self.reopen();
        self.state = SessionState::Running;
        self.generation += 1;
        debug!("Session {} started", self.generation);
        Ok((self.signal.listener(), self.generation))
    }

    /// Listener for tasks that live alongside sessions, such as monitors.
    pub(crate) fn listener(&mut self) -> StopListener {
        self.reopen();
        self.signal.listener()
    }

    /// Replaces a closed signal with a fresh open one.
    fn reopen(&mut self) {
        if self.signal.is_closed() {
            self.signal = StopSignal::new();
        }
    }

    /// Closes the current signal.
    ///
    /// # Returns
    ///
    /// `true` if a running session was stopped, `false` otherwise.
    pub(crate) fn close(&mut self) -> bool {
        let was_running = self.state == SessionState::Running;
        if self.signal.close() {
            debug!("Stop signal closed for session {}", self.generation);
        }
        self.state = SessionState::Stopped;
        was_running
    }

    /// Ends the session numbered `generation` if it is still the running one.
    pub(crate) fn end(&mut self, generation: u64) -> bool {
        if self.generation == generation && self.state == SessionState::Running {
            self.close()
        } else {
            false
        }
    }

    pub(crate) fn track(&mut self, task: JoinHandle<()>) {
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(task);
    }

    pub(crate) fn take_tasks(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.tasks)
    }
}
