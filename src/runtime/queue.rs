//! Thread-safe priority queue for ready operations.
//!
//! Provides one FIFO bucket per [`Priority`] level. Any thread may enqueue; the
//! dispatcher's loop is the only consumer.

use crate::priority::Priority;

use parking_lot::Mutex;
use std::collections::VecDeque;

/// A multi-producer priority queue, FIFO within each level.
///
/// Dequeue always takes the head of the highest non-empty bucket. All buckets live
/// behind a single lock so counts and dequeues observe one consistent snapshot.
pub struct OperationQueue<T> {
    buckets: Mutex<[VecDeque<T>; Priority::COUNT]>,
}

impl<T> OperationQueue<T> {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(std::array::from_fn(|_| VecDeque::new())),
        }
    }

    /// Appends an item to the tail of the bucket for `priority`.
    pub fn enqueue(&self, priority: Priority, item: T) {
        self.buckets.lock()[priority.index()].push_back(item);
    }

    /// Removes and returns the head of the highest non-empty bucket at or above `min`.
    ///
    /// Returns `None` if every qualifying bucket is empty.
    pub fn try_dequeue(&self, min: Priority) -> Option<T> {
        let mut buckets = self.buckets.lock();
        Priority::descending_to(min).find_map(|level| buckets[level.index()].pop_front())
    }

    /// Number of queued items at or above `min`.
    pub fn count(&self, min: Priority) -> usize {
        let buckets = self.buckets.lock();
        Priority::descending_to(min)
            .map(|level| buckets[level.index()].len())
            .sum()
    }

    /// Returns true if any item is queued at or above `min`.
    pub fn has_any(&self, min: Priority) -> bool {
        let buckets = self.buckets.lock();
        Priority::descending_to(min).any(|level| !buckets[level.index()].is_empty())
    }

    pub fn len(&self) -> usize {
        self.count(Priority::LOWEST)
    }

    pub fn is_empty(&self) -> bool {
        !self.has_any(Priority::LOWEST)
    }
}

impl<T> Default for OperationQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_queue_has_nothing_to_dequeue() {
        let queue: OperationQueue<u32> = OperationQueue::new();

        assert!(queue.is_empty());
        assert_eq!(queue.try_dequeue(Priority::LOWEST), None);
    }

    #[test]
    fn test_dequeues_by_priority_then_fifo() {
        let queue = OperationQueue::new();
        queue.enqueue(Priority::Low, 4);
        queue.enqueue(Priority::High, 1);
        queue.enqueue(Priority::Low, 5);
        queue.enqueue(Priority::Medium, 3);
        queue.enqueue(Priority::High, 2);

        let drained: Vec<_> = std::iter::from_fn(|| queue.try_dequeue(Priority::LOWEST)).collect();
        assert_eq!(drained, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_min_priority_filters_lower_buckets() {
        let queue = OperationQueue::new();
        queue.enqueue(Priority::Low, "low");
        queue.enqueue(Priority::Medium, "medium");

        assert_eq!(queue.count(Priority::Medium), 1);
        assert!(!queue.has_any(Priority::High));
        assert_eq!(queue.try_dequeue(Priority::High), None);
        assert_eq!(queue.try_dequeue(Priority::Medium), Some("medium"));
        assert_eq!(queue.try_dequeue(Priority::Medium), None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_concurrent_producers_keep_per_thread_order() {
        let queue = Arc::new(OperationQueue::new());

        let producers: Vec<_> = (0..4usize)
            .map(|producer| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for seq in 0..250 {
                        queue.enqueue(Priority::Medium, (producer, seq));
                    }
                })
            })
            .collect();

        for handle in producers {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 1000);

        let mut last_seen = [None; 4];
        while let Some((producer, seq)) = queue.try_dequeue(Priority::LOWEST) {
            if let Some(previous) = last_seen[producer] {
                assert!(seq > previous, "producer {producer} reordered");
            }
            last_seen[producer] = Some(seq);
        }
        assert!(last_seen.iter().all(|seq| *seq == Some(249)));
    }

    #[test]
    fn test_enqueue_while_draining_keeps_priority_and_fifo() {
        let queue = Arc::new(OperationQueue::new());

        let producers: Vec<_> = (0..4usize)
            .map(|producer| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for seq in 0..500 {
                        let priority = Priority::ALL[seq % Priority::COUNT];
                        queue.enqueue(priority, (producer, priority, seq));
                    }
                })
            })
            .collect();

        let mut drained = Vec::new();
        while drained.len() < 2000 {
            match queue.try_dequeue(Priority::LOWEST) {
                Some(item) => drained.push(item),
                None => thread::yield_now(),
            }
        }

        for handle in producers {
            handle.join().unwrap();
        }
        assert!(queue.is_empty());

        // Within one producer and level, items come out in the order they went in.
        let mut last_seen = std::collections::HashMap::new();
        for (producer, priority, seq) in drained {
            if let Some(previous) = last_seen.insert((producer, priority), seq) {
                assert!(seq > previous, "producer {producer} reordered at {priority}");
            }
        }
        assert_eq!(last_seen.len(), 4 * Priority::COUNT);
    }
}
