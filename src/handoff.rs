//! Bounded, lossy hand-off between a fast producer and a slower consumer.
//!
//! Offering never blocks and never fails: when the queue is full the
//! [`OverflowPolicy`] decides which item is sacrificed, and the loss is only
//! counted. Consumers wait asynchronously for the next item.

use heapless::Deque;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

use crate::readings::MotionId;

/// Capacity of the motion → camera hand-off.
pub const HANDOFF_CAPACITY: usize = 10;

const_assert!(HANDOFF_CAPACITY > 0);

pub type MotionHandoff = HandoffQueue<MotionId, HANDOFF_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued item to admit the new one.
    #[default]
    DropOldest,
    /// Keep the queue as is and discard the new item.
    DropNewest,
}

/// Result of a non-blocking offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offer<T> {
    Queued,
    /// Queued, at the expense of this older item.
    Displaced(T),
    /// Not queued; the queue was full.
    Rejected(T),
}

impl<T> Offer<T> {
    pub fn was_queued(&self) -> bool {
        !matches!(self, Offer::Rejected(_))
    }

    pub fn lost_item(&self) -> bool {
        !matches!(self, Offer::Queued)
    }
}

#[derive(Debug)]
pub struct HandoffQueue<T, const N: usize> {
    slots: Mutex<Deque<T, N>>,
    notify: Notify,
    policy: OverflowPolicy,
    dropped: AtomicU64,
}

impl<T, const N: usize> HandoffQueue<T, N> {
    pub fn new(policy: OverflowPolicy) -> Self {
        Self {
            slots: Mutex::new(Deque::new()),
            notify: Notify::new(),
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn offer(&self, item: T) -> Offer<T> {
        let outcome = {
            let mut slots = self.slots.lock();
            if slots.is_full() {
                match self.policy {
                    OverflowPolicy::DropNewest => Offer::Rejected(item),
                    OverflowPolicy::DropOldest => match slots.pop_front() {
                        Some(oldest) => {
                            // a slot was just freed, so this cannot fail
                            let _ = slots.push_back(item);
                            Offer::Displaced(oldest)
                        }
                        None => Offer::Rejected(item),
                    },
                }
            } else {
                match slots.push_back(item) {
                    Ok(()) => Offer::Queued,
                    Err(item) => Offer::Rejected(item),
                }
            }
        };

        if outcome.lost_item() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.was_queued() {
            self.notify.notify_one();
        }
        outcome
    }

    pub fn try_take(&self) -> Option<T> {
        self.slots.lock().pop_front()
    }

    /// Wait for the next item. Cancel-safe: an item is only removed in the
    /// poll that returns it.
    pub async fn take(&self) -> T {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.try_take() {
                return item;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Items lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_drop_newest_keeps_first_items() {
        let queue: HandoffQueue<u32, 3> = HandoffQueue::new(OverflowPolicy::DropNewest);
        assert_eq!(queue.capacity(), 3);
        assert_eq!(queue.policy(), OverflowPolicy::DropNewest);
        for i in 0..3 {
            assert_eq!(queue.offer(i), Offer::Queued);
        }
        assert_eq!(queue.offer(3), Offer::Rejected(3));
        assert_eq!(queue.dropped(), 1);

        let drained: Vec<u32> = core::iter::from_fn(|| queue.try_take()).collect();
        assert_eq!(drained, vec![0, 1, 2]);
    }

    #[test]
    fn test_drop_oldest_keeps_latest_items() {
        let queue: HandoffQueue<u32, 3> = HandoffQueue::new(OverflowPolicy::DropOldest);
        for i in 0..3 {
            queue.offer(i);
        }
        assert_eq!(queue.offer(3), Offer::Displaced(0));
        assert_eq!(queue.len(), 3);

        let drained: Vec<u32> = core::iter::from_fn(|| queue.try_take()).collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_take_wakes_on_offer() {
        let queue: Arc<HandoffQueue<u32, 4>> = Arc::new(HandoffQueue::new(OverflowPolicy::default()));

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.take().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.offer(42);

        let received = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer should wake")
            .unwrap();
        assert_eq!(received, 42);
    }
}
