//! Single-consumer execution loop.
//!
//! Merges the timer queue into the operation queue and runs ready operations strictly
//! by priority on whichever thread calls [`ExecutorLoop::drain_ready`] or
//! [`ExecutorLoop::run_until_stopped`].

use crate::error::{DispatchError, Result, panic_message};
use crate::priority::Priority;
use crate::runtime::queue::OperationQueue;
use crate::task::Task;
use crate::timer::TimerQueue;

use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

/// A unit of work owned by the loop.
pub(crate) enum Operation {
    /// Plain callable, run once to completion.
    Call(Box<dyn FnOnce() + Send + 'static>),

    /// Suspension-capable operation, polled until it completes.
    Resume(Arc<Task>),
}

impl Operation {
    fn run(self) {
        match self {
            Operation::Call(function) => function(),
            Operation::Resume(task) => task.poll(),
        }
    }
}

/// Wake-up signal for the idle wait.
///
/// `notify` latches a flag under the lock, so a notification issued between the last
/// drain and the start of the wait is never lost.
struct IdleSignal {
    notified: Mutex<bool>,
    condvar: Condvar,
}

impl IdleSignal {
    fn new() -> Self {
        Self {
            notified: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn notify(&self) {
        let mut notified = self.notified.lock();
        *notified = true;
        self.condvar.notify_one();
    }

    // Blocks until notified or until `deadline` passes.
    fn wait(&self, deadline: Option<Instant>) {
        let mut notified = self.notified.lock();
        if !*notified {
            match deadline {
                Some(deadline) => {
                    self.condvar.wait_until(&mut notified, deadline);
                }
                None => self.condvar.wait(&mut notified),
            }
        }
        *notified = false;
    }
}

/// The dispatcher's run loop and the two queues it consumes.
pub(crate) struct ExecutorLoop {
    name: String,
    operations: OperationQueue<Operation>,
    timers: TimerQueue<Operation>,
    running: AtomicBool,
    claimed: AtomicBool,
    idle: IdleSignal,
}

/// Exclusive right to consume an [`ExecutorLoop`]; released on drop.
pub(crate) struct LoopClaim {
    owner: Arc<ExecutorLoop>,
}

impl Drop for LoopClaim {
    fn drop(&mut self) {
        self.owner.claimed.store(false, Ordering::Release);
    }
}

impl ExecutorLoop {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            operations: OperationQueue::new(),
            timers: TimerQueue::new(),
            running: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
            idle: IdleSignal::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Claims the loop for the calling consumer.
    ///
    /// Fails with [`DispatchError::AlreadyRunning`] if another `start`/`execute` holds it.
    pub(crate) fn claim(self: &Arc<Self>) -> Result<LoopClaim> {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DispatchError::AlreadyRunning)?;

        Ok(LoopClaim {
            owner: self.clone(),
        })
    }

    /// Enqueues a ready operation and wakes the loop if it is idle.
    pub(crate) fn post(&self, priority: Priority, operation: Operation) {
        self.operations.enqueue(priority, operation);
        self.idle.notify();
    }

    /// Enqueues an operation due at `due` and wakes the loop so it re-arms its wait.
    pub(crate) fn post_at(&self, due: Instant, priority: Priority, operation: Operation) {
        self.timers.enqueue(due, priority, operation);
        self.idle.notify();
    }

    pub(crate) fn pending(&self, min: Priority) -> usize {
        self.operations.count(min)
    }

    pub(crate) fn has_pending(&self, min: Priority) -> bool {
        self.operations.has_any(min)
    }

    pub(crate) fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Clears the running flag and cancels any idle wait.
    ///
    /// The operation currently executing, if any, still runs to completion.
    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.idle.notify();
    }

    /// Runs ready operations until none are left or the loop is stopped.
    ///
    /// Each step flushes due timers and then runs exactly one operation, so work queued
    /// by that operation is only considered on the following step.
    pub(crate) fn drain_ready(&self) -> Result<()> {
        while self.is_running() {
            self.flush_timers();

            let Some(operation) = self.operations.try_dequeue(Priority::LOWEST) else {
                break;
            };

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| operation.run())) {
                let message = panic_message(payload.as_ref());
                debug!(dispatcher = %self.name, %message, "operation panicked, leaving loop");
                return Err(DispatchError::OperationPanicked(message));
            }
        }

        Ok(())
    }

    /// Alternates between draining and idle-waiting until [`stop`](Self::stop) is called.
    ///
    /// The idle wait is bounded by the next timer's due-time and cut short by any new
    /// submission or by `stop`.
    pub(crate) fn run_until_stopped(&self) -> Result<()> {
        while self.is_running() {
            self.drain_ready()?;

            if !self.is_running() {
                break;
            }

            let deadline = self.timers.next_due();
            trace!(dispatcher = %self.name, ?deadline, "idle");
            self.idle.wait(deadline);
        }

        Ok(())
    }

    // Moves every due timer batch into the operation queue at its recorded priority.
    fn flush_timers(&self) {
        let now = Instant::now();
        while let Some(batch) = self.timers.try_dequeue_due(now) {
            trace!(dispatcher = %self.name, count = batch.len(), "timers due");
            for (priority, operation) in batch {
                self.operations.enqueue(priority, operation);
            }
        }
    }
}
