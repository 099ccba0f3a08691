//! Work queue shared by the crawl workers
//!
//! An unbounded channel carries the URLs. The receiving half is shared by
//! every worker behind an async mutex, so each item is handed to exactly one
//! worker. Completion is tracked separately from the channel: every `put` of a
//! URL raises the unfinished count, every `task_done` lowers it, and `join`
//! waits for it to reach zero.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex, Notify};

/// An item handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// Crawl this URL
    Crawl(String),

    /// Shut the receiving worker down
    Stop,
}

/// Multi-producer, multi-consumer queue with completion tracking
#[derive(Debug)]
pub struct WorkQueue {
    sender: mpsc::UnboundedSender<WorkItem>,
    receiver: Mutex<mpsc::UnboundedReceiver<WorkItem>>,
    unfinished: AtomicUsize,
    all_done: Notify,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            unfinished: AtomicUsize::new(0),
            all_done: Notify::new(),
        }
    }

    /// Enqueues an item
    ///
    /// URLs count as unfinished work until a matching `task_done`. Stop
    /// sentinels are not counted.
    pub fn put(&self, item: WorkItem) {
        if matches!(item, WorkItem::Crawl(_)) {
            self.unfinished.fetch_add(1, Ordering::SeqCst);
        }
        // The receiver lives as long as the queue, so sending cannot fail
        let _ = self.sender.send(item);
    }

    /// Waits for the next item
    ///
    /// Returns `None` only if the channel is closed, which cannot happen while
    /// the queue is alive.
    pub async fn get(&self) -> Option<WorkItem> {
        self.receiver.lock().await.recv().await
    }

    /// Marks one previously fetched URL as fully processed
    pub fn task_done(&self) {
        let previous = self
            .unfinished
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        match previous {
            Ok(1) => self.all_done.notify_waiters(),
            Ok(_) => {}
            Err(_) => tracing::error!("task_done called more times than items were queued"),
        }
    }

    /// Number of URLs queued or in progress
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }

    /// Waits until every queued URL has been marked done
    pub async fn join(&self) {
        loop {
            let notified = self.all_done.notified();
            tokio::pin!(notified);
            // Register before checking the count so a notification in between is not lost
            notified.as_mut().enable();

            if self.unfinished() == 0 {
                return;
            }
            notified.await;
        }
    }
}
