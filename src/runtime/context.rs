//! Thread-local dispatcher context.
//!
//! Records which [`Dispatcher`] is executing on the calling thread, and which task that
//! dispatcher is currently polling. Both are pushed on entry and the previous values
//! restored on exit, so a dispatcher started from inside another dispatcher's operation
//! never clobbers the outer registration.
//!
//! Suspension points ([`YieldNow`](crate::YieldNow), [`Delay`](crate::Delay)) and
//! [`Dispatcher::check_access`] read this context; nothing else does.

use crate::runtime::Dispatcher;
use crate::task::Task;

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    /// Dispatcher whose loop is executing on this thread.
    ///
    /// Set by [`enter_context`] around every `start`/`execute`.
    static CURRENT_DISPATCHER: RefCell<Option<Dispatcher>> = const { RefCell::new(None) };

    /// Task being polled by the current dispatcher, if any.
    ///
    /// Set by [`enter_task`] around every task poll.
    static CURRENT_TASK: RefCell<Option<Arc<Task>>> = const { RefCell::new(None) };
}

// Restores the saved registration, including when an operation unwinds.
struct ContextGuard {
    dispatcher: Option<Option<Dispatcher>>,
    task: Option<Arc<Task>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            CURRENT_DISPATCHER.with(|current| *current.borrow_mut() = dispatcher);
        }
        let task = self.task.take();
        CURRENT_TASK.with(|current| *current.borrow_mut() = task);
    }
}

/// Registers `dispatcher` as active on this thread while `function` runs.
///
/// The task slot is cleared for the duration, since an outer dispatcher's task is not
/// something the inner dispatcher may resume.
pub(crate) fn enter_context<F, R>(dispatcher: Dispatcher, function: F) -> R
where
    F: FnOnce() -> R,
{
    let previous_dispatcher = CURRENT_DISPATCHER.with(|current| current.borrow_mut().replace(dispatcher));
    let previous_task = CURRENT_TASK.with(|current| current.borrow_mut().take());

    let _guard = ContextGuard {
        dispatcher: Some(previous_dispatcher),
        task: previous_task,
    };

    function()
}

/// Marks `task` as the one being polled while `function` runs.
pub(crate) fn enter_task<F, R>(task: Arc<Task>, function: F) -> R
where
    F: FnOnce() -> R,
{
    let previous_task = CURRENT_TASK.with(|current| current.borrow_mut().replace(task));

    let _guard = ContextGuard {
        dispatcher: None,
        task: previous_task,
    };

    function()
}

/// Returns the dispatcher executing on this thread, if any.
pub(crate) fn current() -> Option<Dispatcher> {
    CURRENT_DISPATCHER.with(|current| current.borrow().clone())
}

/// Runs `function` against the current dispatcher without cloning it.
pub(crate) fn with_current<R>(function: impl FnOnce(&Dispatcher) -> R) -> Option<R> {
    CURRENT_DISPATCHER.with(|current| current.borrow().as_ref().map(function))
}

/// Returns the task being polled on this thread, if any.
pub(crate) fn current_task() -> Option<Arc<Task>> {
    CURRENT_TASK.with(|current| current.borrow().clone())
}
