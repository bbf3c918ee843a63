//! FIFO hand-off between submitting tasks and the worker.
//!
//! The queue is unbounded: `enqueue` never blocks and never fails while the
//! worker is alive. Alongside the channel it tracks a count of items accepted
//! but not yet marked done, which backs `wait_all` / `join`. A dedicated
//! `Shutdown` sentinel wakes the worker without a real unit of work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tracing::debug;

use super::operation::OperationId;

/// Item carried by the operation queue.
pub(crate) enum QueueItem {
    /// A real operation to execute, by id.
    Run(OperationId),
    /// Sentinel: wake the worker so it can exit.
    Shutdown,
}

pub(crate) struct Queue {
    tx: UnboundedSender<QueueItem>,
    /// Items accepted but not yet marked done by the worker.
    unfinished: AtomicUsize,
    /// Notified whenever `unfinished` drops to zero.
    drained: Notify,
}

impl Queue {
    /// Creates the queue and the receiving half handed to the worker.
    pub(crate) fn new() -> (Arc<Queue>, UnboundedReceiver<QueueItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Queue {
            tx,
            unfinished: AtomicUsize::new(0),
            drained: Notify::new(),
        });
        (queue, rx)
    }

    /// Enqueues an operation id. Never blocks.
    ///
    /// Returns false if the worker has already exited; the item is dropped
    /// and does not count towards `unfinished`.
    pub(crate) fn enqueue(&self, id: OperationId) -> bool {
        self.unfinished.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(QueueItem::Run(id)).is_err() {
            debug!(op = %id, "queue receiver gone; dropping item");
            self.task_done();
            return false;
        }
        true
    }

    /// Sends the shutdown sentinel, best effort.
    pub(crate) fn push_shutdown(&self) {
        let _ = self.tx.send(QueueItem::Shutdown);
    }

    /// Marks one previously accepted item as done.
    ///
    /// Called by the worker after executing an item, or after skipping one
    /// that was cancelled before dequeue.
    pub(crate) fn task_done(&self) {
        if self.unfinished.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Count of items accepted but not yet marked done.
    pub(crate) fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }

    /// True when every accepted item has been marked done.
    pub(crate) fn is_drained(&self) -> bool {
        self.unfinished() == 0
    }

    /// Resolves once every accepted item has been marked done.
    pub(crate) async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register interest before re-checking so a concurrent
            // `task_done` cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.is_drained() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn join_returns_immediately_when_empty() {
        let (queue, _rx) = Queue::new();
        tokio::time::timeout(Duration::from_millis(100), queue.join())
            .await
            .expect("join on an empty queue must not block");
    }

    #[tokio::test]
    async fn unfinished_tracks_enqueue_and_task_done() {
        let (queue, mut rx) = Queue::new();
        assert!(queue.enqueue(OperationId::new(1)));
        assert!(queue.enqueue(OperationId::new(2)));
        assert_eq!(queue.unfinished(), 2);
        assert!(!queue.is_drained());

        assert!(matches!(rx.recv().await, Some(QueueItem::Run(_))));
        queue.task_done();
        assert_eq!(queue.unfinished(), 1);

        queue.task_done();
        assert!(queue.is_drained());
    }

    #[tokio::test]
    async fn join_wakes_on_last_task_done() {
        let (queue, _rx) = Queue::new();
        queue.enqueue(OperationId::new(1));

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.join().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.task_done();
        tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .expect("join must wake after the last task_done")
            .unwrap();
    }

    #[tokio::test]
    async fn enqueue_after_receiver_dropped_reports_failure() {
        let (queue, rx) = Queue::new();
        drop(rx);
        assert!(!queue.enqueue(OperationId::new(1)));
        // The dropped item must not count as unfinished forever.
        assert!(queue.is_drained());
    }
}
