use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::crawler::CrawlTask;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<CrawlTask>,
    in_flight: usize,
    closed: bool,
}

/// In-process task queue shared by the crawl workers.
///
/// A worker that pops a task holds it "in flight" until it calls
/// [`TaskQueue::complete`]. The queue is drained once nothing is pending
/// and nothing is in flight, since no worker can add more work.
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a task to the back of the queue
    pub async fn push_task(&self, task: CrawlTask) {
        let mut state = self.state.lock().await;
        if state.closed {
            debug!("Queue closed, dropping task: {}", task.url);
            return;
        }
        debug!("Pushed task to queue: {}", task.url);
        state.pending.push_back(task);
        drop(state);
        self.notify.notify_one();
    }

    /// Next task, waiting while other workers may still produce one.
    /// `None` means the crawl has no work left.
    pub async fn pop_task(&self) -> Option<CrawlTask> {
        loop {
            // Register interest before checking so a push in between is not missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(task) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(task);
                }
                if state.closed || state.in_flight == 0 {
                    drop(state);
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark a popped task as finished
    pub async fn complete(&self) {
        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        let drained = state.in_flight == 0 && state.pending.is_empty();
        drop(state);

        if drained {
            self.notify.notify_waiters();
        }
    }

    /// Drop pending work and wake every waiting worker
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.pending.clear();
        drop(state);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order_and_drain() {
        let queue = TaskQueue::new();
        queue.push_task(CrawlTask::list("https://www.example.com/a")).await;
        queue.push_task(CrawlTask::list("https://www.example.com/b")).await;

        let first = queue.pop_task().await.unwrap();
        assert_eq!(first.url, "https://www.example.com/a");
        queue.complete().await;

        let second = queue.pop_task().await.unwrap();
        assert_eq!(second.url, "https://www.example.com/b");
        queue.complete().await;

        assert!(queue.pop_task().await.is_none());
    }

    #[tokio::test]
    async fn test_waiter_receives_follow_up() {
        let queue = Arc::new(TaskQueue::new());
        queue.push_task(CrawlTask::list("https://www.example.com/jobs")).await;
        let task = queue.pop_task().await.unwrap();

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop_task().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue
            .push_task(task.detail("https://www.example.com/listings/1", Default::default()))
            .await;
        queue.complete().await;

        let follow_up = waiter.await.unwrap().unwrap();
        assert_eq!(follow_up.url, "https://www.example.com/listings/1");
    }

    #[tokio::test]
    async fn test_close_releases_waiters() {
        let queue = Arc::new(TaskQueue::new());
        queue.push_task(CrawlTask::list("https://www.example.com/jobs")).await;
        let _held = queue.pop_task().await.unwrap();

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop_task().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close().await;

        assert!(waiter.await.unwrap().is_none());
    }
}
