//! Timed operations and the `delay()` future.
//!
//! [`TimerQueue`] stores operations keyed by an absolute due-time. The dispatcher loop
//! promotes due batches into its operation queue at each drain step. [`delay`] builds a
//! suspension point on top of it: the timer entry wakes the suspended task, which then
//! resumes on the dispatcher's thread.

use crate::error::{DispatchError, Result};
use crate::priority::Priority;
use crate::runtime::context;

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Thread-safe store of items ordered by due-time.
///
/// Items sharing a due-time form one batch, kept in insertion order. The lock
/// serializes producers, so insertion order within a batch is the order in which
/// competing threads acquired it.
pub struct TimerQueue<T> {
    entries: Mutex<BTreeMap<Instant, Vec<(Priority, T)>>>,
}

impl<T> TimerQueue<T> {
    /// Creates a new empty timer queue.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers an item to become due at `due`.
    ///
    /// Due-times in the past are accepted as-is and become due on the next check.
    pub fn enqueue(&self, due: Instant, priority: Priority, item: T) {
        self.entries
            .lock()
            .entry(due)
            .or_default()
            .push((priority, item));
    }

    /// Returns the earliest pending due-time, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.lock().first_key_value().map(|(due, _)| *due)
    }

    /// Removes and returns the earliest batch if its due-time is at or before `now`.
    ///
    /// A single call never mixes two due-times; call repeatedly to drain successive
    /// batches in due-time order.
    pub fn try_dequeue_due(&self, now: Instant) -> Option<Vec<(Priority, T)>> {
        let mut entries = self.entries.lock();
        match entries.first_entry() {
            Some(batch) if *batch.key() <= now => Some(batch.remove()),
            _ => None,
        }
    }

    /// Total number of pending items across all batches.
    pub fn len(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A future that completes once its deadline has passed.
///
/// Created via [`delay`]. The first poll registers a timer on the current dispatcher;
/// when it fires, the waiting task resumes at [`Priority::HIGHEST`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Delay {
    deadline: Instant,
    registered: bool,
}

impl Delay {
    /// Creates a delay that completes `duration` from now.
    pub fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
            registered: false,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Future for Delay {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if Instant::now() >= self.deadline {
            return Poll::Ready(Ok(()));
        }

        if !self.registered {
            let Some(dispatcher) = context::current() else {
                return Poll::Ready(Err(DispatchError::NotRunning));
            };

            let waker = cx.waker().clone();
            dispatcher.schedule_at(self.deadline, Priority::HIGHEST, move || waker.wake());
            self.registered = true;
        }

        Poll::Pending
    }
}

/// Suspends the current operation for at least `duration`.
///
/// Must be awaited inside an operation running on a dispatcher; otherwise it resolves
/// to [`DispatchError::NotRunning`].
///
/// # Example
/// ```ignore
/// dispatcher.dispatch_async(async {
///     dispatcher::delay(Duration::from_millis(100)).await.ok();
///     println!("100ms later, still on the dispatcher thread");
/// });
/// ```
pub fn delay(duration: Duration) -> Delay {
    Delay::new(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_queue_has_nothing_due() {
        let timers: TimerQueue<u32> = TimerQueue::new();

        assert!(timers.is_empty());
        assert_eq!(timers.next_due(), None);
        assert!(timers.try_dequeue_due(Instant::now()).is_none());
    }

    #[test]
    fn test_same_due_time_is_returned_as_one_batch() {
        let timers = TimerQueue::new();
        let due = Instant::now();
        timers.enqueue(due, Priority::Medium, 1);
        timers.enqueue(due, Priority::High, 2);

        let batch = timers.try_dequeue_due(due).unwrap();
        assert_eq!(batch, vec![(Priority::Medium, 1), (Priority::High, 2)]);
        assert!(timers.try_dequeue_due(due).is_none());
    }

    #[test]
    fn test_only_due_entries_are_dequeued() {
        let timers = TimerQueue::new();
        let base = Instant::now();
        timers.enqueue(base + Duration::from_secs(1), Priority::Medium, 1);
        timers.enqueue(base + Duration::from_secs(3), Priority::Medium, 3);
        timers.enqueue(base + Duration::from_secs(4), Priority::Medium, 4);
        timers.enqueue(base + Duration::from_secs(2), Priority::Medium, 2);

        let now = base + Duration::from_millis(2500);
        let first = timers.try_dequeue_due(now).unwrap();
        let second = timers.try_dequeue_due(now).unwrap();

        assert_eq!(first, vec![(Priority::Medium, 1)]);
        assert_eq!(second, vec![(Priority::Medium, 2)]);
        assert!(timers.try_dequeue_due(now).is_none());
        assert_eq!(timers.len(), 2);
        assert_eq!(timers.next_due(), Some(base + Duration::from_secs(3)));
    }

    #[test]
    fn test_past_due_time_is_dequeued_on_next_check() {
        let timers = TimerQueue::new();
        let due = Instant::now();
        timers.enqueue(due, Priority::Low, "late");

        std::thread::sleep(Duration::from_millis(1));
        assert_eq!(
            timers.try_dequeue_due(Instant::now()),
            Some(vec![(Priority::Low, "late")])
        );
    }

    #[test]
    fn test_delay_outside_dispatcher_fails() {
        let result = futures::executor::block_on(delay(Duration::from_millis(10)));
        assert!(matches!(result, Err(DispatchError::NotRunning)));
    }
}
