//! Suspension-capable operations.
//!
//! A [`Task`] wraps a future submitted with
//! [`Dispatcher::dispatch_async`](crate::Dispatcher::dispatch_async). The loop polls it
//! once per dequeue. While pending, the task is not polled again until something
//! re-enqueues it:
//!
//! 1. [`YieldNow`](crate::YieldNow) queues a continuation at the yield's minimum priority.
//! 2. Its waker re-enqueues it at [`Priority::HIGHEST`], from any thread. This is how
//!    completions produced elsewhere (another thread, a timer, another dispatcher) are
//!    marshaled back onto the owning thread.
//!
//! [`DispatcherOperation`] is the future handed out by
//! [`Dispatcher::invoke_async`](crate::Dispatcher::invoke_async).

use crate::error::{DispatchError, Result};
use crate::priority::Priority;
use crate::runtime::context;
use crate::runtime::executor::{ExecutorLoop, Operation};

use futures::channel::oneshot;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

/// Priority at which woken tasks resume.
pub(crate) const COMPLETION_PRIORITY: Priority = Priority::HIGHEST;

/// A future owned by one dispatcher loop.
///
/// - `future`: taken out while being polled, dropped once complete
/// - `owner`: the loop to re-enqueue into; weak so queued tasks don't keep it alive
/// - `queued`: set while the task sits in the operation queue, so duplicate wakes
///   never cause duplicate polls
pub(crate) struct Task {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    owner: Weak<ExecutorLoop>,
    queued: AtomicBool,
}

impl Task {
    /// Wraps `future` and enqueues it on `owner` at `priority`.
    pub(crate) fn spawn<F>(owner: &Arc<ExecutorLoop>, priority: Priority, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(Task {
            future: Mutex::new(Some(Box::pin(future))),
            owner: Arc::downgrade(owner),
            queued: AtomicBool::new(true),
        });

        owner.post(priority, Operation::Resume(task));
    }

    /// Polls the wrapped future once on the calling (loop) thread.
    pub(crate) fn poll(self: Arc<Self>) {
        self.queued.store(false, Ordering::Release);

        let Some(mut future) = self.future.lock().take() else {
            return;
        };

        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);

        let poll = context::enter_task(self.clone(), || future.as_mut().poll(&mut cx));

        if poll.is_pending() {
            *self.future.lock() = Some(future);
        }
    }

    /// Re-enqueues the task at `priority` unless it is already queued.
    ///
    /// Does nothing once the owning dispatcher has been dropped.
    pub(crate) fn schedule(self: &Arc<Self>, priority: Priority) {
        if self.queued.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(owner) = self.owner.upgrade() {
            owner.post(priority, Operation::Resume(self.clone()));
        }
    }

    /// Queues a continuation at `priority` that raises `resumed` and then polls the task.
    ///
    /// Unlike [`schedule`](Self::schedule) this ignores the `queued` flag: an entry left
    /// by an earlier wake may poll the task first, but only this continuation raises
    /// `resumed`.
    pub(crate) fn continue_at(self: &Arc<Self>, priority: Priority, resumed: Arc<AtomicBool>) {
        let Some(owner) = self.owner.upgrade() else {
            return;
        };

        let task = self.clone();
        let continuation = move || {
            resumed.store(true, Ordering::Release);
            task.poll();
        };
        owner.post(priority, Operation::Call(Box::new(continuation)));
    }
}

/// Pending result of [`Dispatcher::invoke_async`](crate::Dispatcher::invoke_async).
///
/// Resolves to the operation's return value, to
/// [`DispatchError::OperationPanicked`] if it panicked, or to
/// [`DispatchError::Canceled`] if it was dropped without running.
#[must_use = "futures do nothing unless awaited"]
pub struct DispatcherOperation<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> DispatcherOperation<T> {
    pub(crate) fn new(receiver: oneshot::Receiver<Result<T>>) -> Self {
        Self { receiver }
    }
}

impl<T> Future for DispatcherOperation<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DispatchError::Canceled)))
    }
}
