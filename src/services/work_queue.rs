//! Work queue of entities pending a state check.
//!
//! Multi-consumer, never blocks producers, and holds at most one pending entry
//! per entity. Consumers wait on a [`Notify`] and a [`CancellationToken`].

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::models::EntityId;

/// An entity waiting for its next poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: EntityId,
    pub enqueued_at: Instant,
}

/// Returned by [`WorkQueue::dequeue`] once the wait has been cancelled.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Work queue wait cancelled")]
pub struct QueueCancelled;

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<WorkItem>,
    pending: HashSet<EntityId>,
}

/// Thread-safe queue of entity ids.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an id and wake one waiting consumer.
    ///
    /// Returns `false` without queueing anything when the id is already pending.
    pub fn enqueue(&self, id: EntityId) -> bool {
        {
            let mut state = self.lock();
            if !state.pending.insert(id.clone()) {
                return false;
            }
            state.items.push_back(WorkItem {
                id,
                enqueued_at: Instant::now(),
            });
        }
        self.notify.notify_one();
        true
    }

    /// Take the next item without waiting.
    pub fn try_dequeue(&self) -> Option<WorkItem> {
        let mut state = self.lock();
        let item = state.items.pop_front()?;
        state.pending.remove(&item.id);
        Some(item)
    }

    /// Wait for the next item or for cancellation, whichever comes first.
    ///
    /// Nothing is handed out once `cancel` has fired, even if items remain.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<WorkItem, QueueCancelled> {
        loop {
            if cancel.is_cancelled() {
                return Err(QueueCancelled);
            }

            // Register interest before checking so an enqueue between the check
            // and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_dequeue() {
                return Ok(item);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(QueueCancelled),
                () = &mut notified => {}
            }
        }
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.lock().pending.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_enqueue_rejects_pending_duplicate() {
        let queue = WorkQueue::new();
        assert!(queue.enqueue(EntityId::from("n1")));
        assert!(!queue.enqueue(EntityId::from("n1")));
        assert_eq!(queue.len(), 1);

        let item = queue.try_dequeue().unwrap();
        assert_eq!(item.id, EntityId::from("n1"));
        assert!(!queue.contains(&item.id));

        // Once taken, the id may be queued again.
        assert!(queue.enqueue(EntityId::from("n1")));
    }

    #[tokio::test]
    async fn test_dequeue_returns_queued_item() {
        let queue = WorkQueue::new();
        let cancel = CancellationToken::new();
        queue.enqueue(EntityId::from("a"));
        queue.enqueue(EntityId::from("b"));

        assert_eq!(queue.dequeue(&cancel).await.unwrap().id, EntityId::from("a"));
        assert_eq!(queue.dequeue(&cancel).await.unwrap().id, EntityId::from("b"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_enqueue() {
        let queue = Arc::new(WorkQueue::new());
        let cancel = CancellationToken::new();

        let consumer = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.dequeue(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(EntityId::from("late"));

        let item = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer should wake")
            .unwrap()
            .unwrap();
        assert_eq!(item.id, EntityId::from("late"));
    }

    #[tokio::test]
    async fn test_dequeue_observes_cancellation() {
        let queue = Arc::new(WorkQueue::new());
        let cancel = CancellationToken::new();

        let consumer = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.dequeue(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(500), consumer)
            .await
            .expect("cancellation should be prompt")
            .unwrap();
        assert_eq!(result, Err(QueueCancelled));
    }

    #[tokio::test]
    async fn test_no_items_after_cancellation() {
        let queue = WorkQueue::new();
        let cancel = CancellationToken::new();
        queue.enqueue(EntityId::from("x"));
        cancel.cancel();

        assert_eq!(queue.dequeue(&cancel).await, Err(QueueCancelled));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_many_consumers_each_item_once() {
        let queue = Arc::new(WorkQueue::new());
        for i in 0..50 {
            queue.enqueue(EntityId::new(format!("e{i}")));
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Some(item) = queue.try_dequeue() {
                    taken.push(item.id);
                }
                taken
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        assert_eq!(all.len(), 50);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 50, "no item handed out twice");
    }

    #[test]
    fn test_pending_dequeue_is_woken_by_enqueue() {
        use tokio_test::{assert_pending, assert_ready_ok, task};

        let queue = WorkQueue::new();
        let cancel = CancellationToken::new();
        let mut dequeue = task::spawn(queue.dequeue(&cancel));

        assert_pending!(dequeue.poll());
        queue.enqueue(EntityId::from("n1"));
        assert!(dequeue.is_woken());

        let item = assert_ready_ok!(dequeue.poll());
        assert_eq!(item.id, EntityId::from("n1"));
    }
}
