//! Consumption task that runs handlers for delivered errors.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    slice,
    sync::Arc,
};

use {
    async_channel::Receiver,
    tokio::select,
    tracing::debug,
};

use crate::{
    buffer::ErrorEntry,
    collection::{Shared, session::StopListener},
    handlers::{Severity, SharedHandler, panic_message},
};

/// Which handlers a runner invokes.
pub(crate) enum Delivery {
    /// One ad-hoc handler that is not part of the chain.
    Single(SharedHandler),
    /// Every handler in the chain, in registration order.
    Chain,
}

/// Receives errors from the conduit and runs handlers on them.
///
/// Handlers run one after another on this task; a slow handler delays the
/// next delivery. A panic escaping a handler ends the session. Errors still
/// waiting in the conduit when the runner stops go back to the buffer.
pub(crate) async fn run_handlers(
    shared: Arc<Shared>,
    stop: StopListener,
    conduit: Receiver<ErrorEntry>,
    delivery: Delivery,
    generation: u64,
) {
    debug!("Handler runner started for session {generation}");
    loop {
        let entry = select! {
            biased;
            () = stop.stopped() => break,
            received = conduit.recv() => match received {
                Ok(entry) => entry,
                Err(_) => break,
            },
        };

        let snapshot;
        let handlers: &[SharedHandler] = match &delivery {
            Delivery::Single(handler) => slice::from_ref(handler),
            // The chain may change between deliveries
            Delivery::Chain => {
                snapshot = shared.chain_snapshot();
                &snapshot
            }
        };

        for handler in handlers {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(&entry)));
            if let Err(payload) = outcome {
                shared.sink().write(
                    Severity::Error,
                    &format!(
                        "Handler panicked on \"{entry}\", ending session: {}",
                        panic_message(&*payload)
                    ),
                );
                shared.end_session(generation);
                requeue_pending(&shared, &conduit);
                return;
            }
        }
    }
    requeue_pending(&shared, &conduit);
    debug!("Handler runner stopped for session {generation}");
}

/// Moves entries left in the conduit back into the buffer.
fn requeue_pending(shared: &Shared, conduit: &Receiver<ErrorEntry>) {
    while let Ok(entry) = conduit.try_recv() {
        debug!("Returning undelivered error #{} to the buffer", entry.sequence());
        shared.requeue(entry);
    }
}
