//! Pieces shared by both stage engines: the bounded task channel and the
//! worker count rule.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{Span, warn};

/// Receiving half of a task channel, shared by every worker of a stage.
pub(crate) type TaskReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Bounded channel sized to the worker count.
///
/// Dropping the returned sender closes the channel; workers keep receiving
/// buffered tasks until [`next_task`] yields `None`.
pub(crate) fn task_channel<T>(capacity: usize) -> (mpsc::Sender<T>, TaskReceiver<T>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (sender, Arc::new(Mutex::new(receiver)))
}

/// Take the next task, or `None` once the channel is closed and drained.
pub(crate) async fn next_task<T>(receiver: &TaskReceiver<T>) -> Option<T> {
    let mut guard = receiver.lock().await;
    guard.recv().await
}

/// Worker count actually used by a stage: at least one.
pub(crate) fn worker_count(requested: usize, log: &Span) -> usize {
    if requested < 1 {
        log.in_scope(|| warn!(requested, "num_workers < 1, set to 1"));
        return 1;
    }
    requested
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_at_least_one() {
        let log = Span::none();
        assert_eq!(worker_count(0, &log), 1);
        assert_eq!(worker_count(1, &log), 1);
        assert_eq!(worker_count(8, &log), 8);
    }

    #[tokio::test]
    async fn receivers_drain_after_close() {
        let (sender, receiver) = task_channel(3);
        for i in 0..3 {
            sender.send(i).await.expect("send");
        }
        drop(sender);

        let mut drained = Vec::new();
        while let Some(task) = next_task(&receiver).await {
            drained.push(task);
        }
        assert_eq!(drained, vec![0, 1, 2]);
    }
}
