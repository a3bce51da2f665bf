//! Background loops that move buffered errors into conduits.
//!
//! Both loops sleep until the buffer changes instead of polling it. Every
//! mutation of the buffer bumps a counter on a `watch` channel, and the loops
//! mark the counter as seen before they look at the buffer, so a change made
//! while a loop is busy is never missed.

use std::sync::Arc;

use {
    async_channel::Sender,
    tokio::{select, sync::watch::Receiver},
    tracing::debug,
};

use crate::{
    buffer::ErrorEntry,
    collection::{Shared, session::StopListener},
};

/// Outcome of waiting for the next buffer change.
enum Wake {
    Changed,
    Stop,
}

async fn wait_for_change(stop: &StopListener, changes: &mut Receiver<u64>) -> Wake {
    select! {
        biased;
        () = stop.stopped() => Wake::Stop,
        changed = changes.changed() => match changed {
            Ok(()) => Wake::Changed,
            Err(_) => Wake::Stop,
        },
    }
}

/// Pops entries head-first and pushes them onto the delivery conduit.
///
/// A full conduit suspends the loop until the consumer catches up. An entry
/// that was popped but could not be delivered goes back to the head of the
/// buffer. Once every receiver of the conduit is gone the session ends.
pub(crate) async fn dispatch_loop(
    shared: Arc<Shared>,
    stop: StopListener,
    mut changes: Receiver<u64>,
    conduit: Sender<ErrorEntry>,
    generation: u64,
) {
    debug!("Dispatch loop started");
    loop {
        if stop.is_stopped() {
            break;
        }
        changes.mark_unchanged();

        while let Some(entry) = shared.pop_entry() {
            select! {
                biased;
                () = stop.stopped() => {
                    shared.requeue(entry);
                    debug!("Dispatch loop stopped");
                    return;
                }
                sent = conduit.send(entry.clone()) => {
                    if sent.is_err() {
                        shared.requeue(entry);
                        if shared.end_session(generation) {
                            debug!("Delivery conduit closed, ended session {generation}");
                        }
                        return;
                    }
                }
            }
        }

        if let Wake::Stop = wait_for_change(&stop, &mut changes).await {
            debug!("Dispatch loop stopped");
            return;
        }
    }
}

/// Reports each new head of the buffer without removing it.
///
/// A head is reported once; it is reported again only if it leaves and
/// re-enters the head position under a different sequence number.
pub(crate) async fn monitor_loop(
    shared: Arc<Shared>,
    stop: StopListener,
    mut changes: Receiver<u64>,
    conduit: Sender<ErrorEntry>,
) {
    debug!("Monitor loop started");
    let mut last_reported = None;
    loop {
        changes.mark_unchanged();

        if let Some(head) = shared.peek_entry()
            && last_reported != Some(head.sequence())
        {
            let sequence = head.sequence();
            select! {
                biased;
                () = stop.stopped() => {
                    debug!("Monitor loop stopped");
                    return;
                }
                sent = conduit.send(head) => {
                    if sent.is_err() {
                        debug!("Monitor conduit closed, monitor loop exiting");
                        return;
                    }
                    last_reported = Some(sequence);
                }
            }
        }

        if let Wake::Stop = wait_for_change(&stop, &mut changes).await {
            debug!("Monitor loop stopped");
            return;
        }
    }
}
