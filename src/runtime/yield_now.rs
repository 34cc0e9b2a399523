//! Priority-aware cooperative yield.
//!
//! [`YieldNow`] is how a suspension-capable operation gives queued work a turn without
//! leaving its dispatcher. It never suspends when nothing qualifying is waiting, and it
//! resumes on the owning thread from the queue position it took at its minimum priority.

use crate::error::{DispatchError, Result};
use crate::priority::Priority;
use crate::runtime::context;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

/// Cooperative suspension point: lets queued work at or above a priority run first.
///
/// When polled inside a dispatcher operation:
/// - if nothing is queued at or above `min_priority`, it completes immediately;
/// - otherwise a continuation of the current task is queued at `min_priority` and
///   control returns to the loop, which runs the queued work before that continuation.
///
/// Polls caused by anything other than that continuation (a stray wake, a sibling
/// future in a `join!`) leave it pending.
///
/// Outside a running dispatcher it resolves to [`DispatchError::NotRunning`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    min_priority: Priority,
    resumed: Option<Arc<AtomicBool>>,
}

impl YieldNow {
    pub(crate) fn new(min_priority: Priority) -> Self {
        Self {
            min_priority,
            resumed: None,
        }
    }

    /// Returns true if the yield can complete without suspending.
    fn is_satisfied(&self) -> Result<bool> {
        context::with_current(|dispatcher| !dispatcher.has_pending(self.min_priority))
            .ok_or(DispatchError::NotRunning)
    }
}

impl Future for YieldNow {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(resumed) = &self.resumed {
            if resumed.load(Ordering::Acquire) {
                return Poll::Ready(Ok(()));
            }
            return Poll::Pending;
        }

        match self.is_satisfied() {
            Ok(true) => return Poll::Ready(Ok(())),
            Ok(false) => {}
            Err(error) => return Poll::Ready(Err(error)),
        }

        let Some(task) = context::current_task() else {
            return Poll::Ready(Err(DispatchError::NotRunning));
        };

        let resumed = Arc::new(AtomicBool::new(false));
        task.continue_at(self.min_priority, resumed.clone());
        self.resumed = Some(resumed);
        Poll::Pending
    }
}

/// Yields to queued operations at or above `min_priority`.
///
/// Similar to `tokio::task::yield_now()`, but priority-aware and a no-op when nothing
/// qualifying is queued.
///
/// # Arguments
/// * `min_priority` - lowest priority of queued work allowed to run first
///
/// # Example
/// ```ignore
/// dispatcher.dispatch_async(async {
///     for chunk in work {
///         process(chunk);
///         if dispatcher::yield_now(Priority::Medium).await.is_err() {
///             break;
///         }
///     }
/// });
/// ```
pub fn yield_now(min_priority: Priority) -> YieldNow {
    YieldNow::new(min_priority)
}
