//! Dedicated dispatcher thread.
//!
//! [`Dispatcher::spawn`](crate::Dispatcher::spawn) runs a dispatcher's loop on a new
//! thread. The loop is claimed and marked running on the spawning thread, so a `stop`
//! issued right after `spawn` returns is observed by the worker and no other caller can
//! start the same dispatcher in between.

use crate::builder::DispatcherBuilder;
use crate::error::Result;
use crate::runtime::Dispatcher;

use std::thread;
use tracing::{debug, error};

/// Starts `dispatcher` on a new thread configured by `builder`.
pub(crate) fn spawn_worker(dispatcher: Dispatcher, builder: &DispatcherBuilder) -> Result<Dispatcher> {
    let claim = dispatcher.claim_for_worker()?;

    let mut thread = thread::Builder::new().name(builder.thread_name().to_string());
    if let Some(stack_size) = builder.thread_stack_size() {
        thread = thread.stack_size(stack_size);
    }

    let worker = dispatcher.clone();
    let spawned = thread.spawn(move || {
        debug!(dispatcher = %worker.name(), "dispatcher thread started");

        if let Err(err) = worker.run_worker(claim) {
            error!(dispatcher = %worker.name(), error = %err, "dispatcher thread stopped on error");
        }
    });

    if let Err(err) = spawned {
        // The claim moved into the failed closure and was released with it.
        dispatcher.stop();
        return Err(err.into());
    }

    Ok(dispatcher)
}
