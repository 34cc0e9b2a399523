//! Public dispatcher handle.
//!
//! A [`Dispatcher`] owns one execution loop. Any thread may submit work to it; only the
//! thread inside [`Dispatcher::start`] or [`Dispatcher::execute`] runs that work.

use crate::builder::DispatcherBuilder;
use crate::error::{DispatchError, Result, panic_message};
use crate::priority::Priority;
use crate::runtime::context::{self, enter_context};
use crate::runtime::executor::{ExecutorLoop, LoopClaim, Operation};
use crate::runtime::yield_now::YieldNow;
use crate::task::{DispatcherOperation, Task};

use futures::channel::oneshot;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cooperative, priority-ordered scheduler bound to a single executing thread.
///
/// Cloning produces another handle to the same loop; equality is identity.
///
/// # Example
/// ```ignore
/// let dispatcher = Dispatcher::new();
/// dispatcher.dispatch_with(Priority::Low, || println!("last"));
/// dispatcher.dispatch_with(Priority::High, || println!("first"));
/// dispatcher.execute()?;
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<ExecutorLoop>,
}

#[derive(Clone, Copy)]
enum LoopMode {
    Drain,
    UntilStopped,
}

impl Dispatcher {
    /// Creates an unstarted dispatcher with default settings.
    pub fn new() -> Self {
        DispatcherBuilder::new().build()
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub(crate) fn with_name(name: String) -> Self {
        Self {
            inner: Arc::new(ExecutorLoop::new(name)),
        }
    }

    /// Creates a dispatcher and starts it on a dedicated thread.
    ///
    /// Returns as soon as the thread is created; the loop may not have started yet,
    /// but work submitted in the meantime is kept.
    pub fn spawn() -> Result<Dispatcher> {
        DispatcherBuilder::new().spawn()
    }

    /// Returns the dispatcher executing on the calling thread, if any.
    pub fn current() -> Option<Dispatcher> {
        context::current()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Runs the loop on the calling thread until [`stop`](Self::stop) is called.
    ///
    /// When idle, the thread sleeps until new work is submitted or the next timer is
    /// due. Returns [`DispatchError::OperationPanicked`] if a dispatched operation
    /// panics. Queued work is kept and the stopped dispatcher may be started again.
    pub fn start(&self) -> Result<()> {
        let claim = self.inner.claim()?;
        self.inner.set_running();
        self.run(claim, LoopMode::UntilStopped)
    }

    /// Runs every operation that is ready now, then returns.
    ///
    /// Due timers are promoted along the way; future timers stay queued. The dispatcher
    /// is not running afterwards.
    pub fn execute(&self) -> Result<()> {
        let claim = self.inner.claim()?;
        self.inner.set_running();
        self.run(claim, LoopMode::Drain)
    }

    /// Stops the loop after the operation currently executing, if any, returns.
    ///
    /// Queued operations stay queued. Safe to call from any thread.
    pub fn stop(&self) {
        debug!(dispatcher = %self.name(), "stop requested");
        self.inner.stop();
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Returns true if this dispatcher is the one executing on the calling thread.
    pub fn check_access(&self) -> bool {
        context::with_current(|current| current == self).unwrap_or(false)
    }

    /// Number of queued operations at or above `min`.
    pub fn pending(&self, min: Priority) -> usize {
        self.inner.pending(min)
    }

    /// Returns true if any operation is queued at or above `min`.
    pub fn has_pending(&self, min: Priority) -> bool {
        self.inner.has_pending(min)
    }

    /// Number of scheduled operations whose due-time has not been flushed yet.
    pub fn pending_timers(&self) -> usize {
        self.inner.pending_timers()
    }

    /// Queues `operation` at [`Priority::Medium`]. Never blocks.
    pub fn dispatch<F>(&self, operation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch_with(Priority::default(), operation);
    }

    /// Queues `operation` at `priority`. Never blocks.
    pub fn dispatch_with<F>(&self, priority: Priority, operation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.post(priority, Operation::Call(Box::new(operation)));
    }

    /// Queues a suspension-capable operation at [`Priority::Medium`].
    pub fn dispatch_async<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.dispatch_async_with(Priority::default(), future);
    }

    /// Queues a suspension-capable operation at `priority`.
    ///
    /// The future is first polled when dequeued. Each time it resumes after a
    /// suspension it runs on this dispatcher's thread again.
    pub fn dispatch_async_with<F>(&self, priority: Priority, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Task::spawn(&self.inner, priority, future);
    }

    /// Runs `operation` on this dispatcher at [`Priority::Medium`] and returns its result.
    pub fn invoke<F, R>(&self, operation: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.invoke_with(Priority::default(), operation)
    }

    /// Runs `operation` on this dispatcher at `priority` and returns its result.
    ///
    /// Called from the dispatcher's own thread, the operation runs in place right away.
    /// Otherwise the calling thread blocks until the loop has run it. A panic inside
    /// the operation is returned as [`DispatchError::OperationPanicked`].
    pub fn invoke_with<F, R>(&self, priority: Priority, operation: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.check_access() {
            return catch_operation(operation);
        }

        futures::executor::block_on(self.invoke_async_with(priority, operation))
    }

    /// Queues `operation` at [`Priority::Medium`] and returns a future for its result.
    pub fn invoke_async<F, R>(&self, operation: F) -> DispatcherOperation<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.invoke_async_with(Priority::default(), operation)
    }

    /// Queues `operation` at `priority` and returns a future for its result.
    ///
    /// Never blocks, even on the dispatcher's own thread. A panic inside the operation
    /// resolves the future to [`DispatchError::OperationPanicked`] instead of stopping
    /// the loop.
    pub fn invoke_async_with<F, R>(&self, priority: Priority, operation: F) -> DispatcherOperation<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();

        self.dispatch_with(priority, move || {
            // The caller may have dropped the future; nobody is left to tell.
            let _ = sender.send(catch_operation(operation));
        });

        DispatcherOperation::new(receiver)
    }

    /// Queues `operation` at [`Priority::Medium`] to run after `delay`.
    pub fn schedule<F>(&self, delay: Duration, operation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_with(delay, Priority::default(), operation);
    }

    /// Queues `operation` at `priority` to run after `delay`.
    ///
    /// A zero delay still goes through the timer queue and becomes ready on the next
    /// drain step.
    pub fn schedule_with<F>(&self, delay: Duration, priority: Priority, operation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(Instant::now() + delay, priority, operation);
    }

    /// Queues `operation` at `priority` to run once `due` has passed.
    pub fn schedule_at<F>(&self, due: Instant, priority: Priority, operation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.post_at(due, priority, Operation::Call(Box::new(operation)));
    }

    /// Returns a suspension point that lets queued work at or above `min_priority`
    /// run before the awaiting operation continues.
    ///
    /// See [`YieldNow`].
    pub fn yield_now(min_priority: Priority) -> YieldNow {
        YieldNow::new(min_priority)
    }

    /// Claims the loop on behalf of a thread that has not started yet.
    pub(crate) fn claim_for_worker(&self) -> Result<LoopClaim> {
        let claim = self.inner.claim()?;
        self.inner.set_running();
        Ok(claim)
    }

    /// Runs the claimed loop on the calling thread in the worker's mode.
    pub(crate) fn run_worker(&self, claim: LoopClaim) -> Result<()> {
        self.run(claim, LoopMode::UntilStopped)
    }

    fn run(&self, claim: LoopClaim, mode: LoopMode) -> Result<()> {
        let _claim = claim;

        debug!(dispatcher = %self.name(), "loop entered");
        let result = enter_context(self.clone(), || match mode {
            LoopMode::Drain => self.inner.drain_ready(),
            LoopMode::UntilStopped => self.inner.run_until_stopped(),
        });
        // Leaving for any reason, including a panicked operation, ends the run.
        self.inner.stop();
        debug!(dispatcher = %self.name(), ok = result.is_ok(), "loop exited");

        result
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Dispatcher {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Dispatcher {}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name())
            .field("running", &self.is_running())
            .field("pending", &self.pending(Priority::LOWEST))
            .finish()
    }
}

// Runs `operation`, turning a panic into an error for whoever awaits the result.
fn catch_operation<F, R>(operation: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(operation))
        .map_err(|payload| DispatchError::OperationPanicked(panic_message(payload.as_ref())))
}

