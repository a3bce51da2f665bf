//! Errbox demo
//!
//! Reports a handful of errors from worker threads into a collection with
//! the default logger and a panic-recovering handler, then shuts down.

use std::{sync::Arc, thread};

use {
    anyhow::anyhow,
    tokio::time::{Duration, sleep},
    tracing::{info, warn},
};

use errbox::{ErrorCollection, PanicRecover, ResultExt, TracingSink, init_logging};

/// Main entry point for the errbox demo.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("errbox=info,info")?;

    let collection = ErrorCollection::default();
    collection.add_handler(PanicRecover::new(Arc::new(TracingSink)));
    collection.handle_chain()?;

    let workers: Vec<_> = (0..3)
        .map(|id| {
            let collection = collection.clone();
            thread::spawn(move || {
                collection.add(anyhow!("worker {id} lost its connection"));
                let _ = "forty-two"
                    .parse::<u32>()
                    .or_collect_with(&collection, format!("worker {id} parsing input"));
            })
        })
        .collect();
    for (id, worker) in workers.into_iter().enumerate() {
        if worker.join().is_err() {
            warn!("Worker {} panicked before reporting its errors", id);
        }
    }

    while !collection.is_empty() {
        sleep(Duration::from_millis(10)).await;
    }
    // Let the last delivered error reach the handlers
    sleep(Duration::from_millis(50)).await;

    collection.shutdown().await;
    info!("Demo finished");
    Ok(())
}
