use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Single-slot coalescing inbox.
///
/// Senders never wait: a new message replaces whatever the receiver has not
/// consumed yet, and the displaced message is handed back to the sender.
/// The single receiver is the supervisor loop.
pub(crate) struct Inbox<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
    closed: AtomicBool,
}

impl<T> Inbox<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Remove the pending message, if any, without waiting.
    pub(crate) fn try_take(&self) -> Option<T> {
        self.slot.lock().expect("inbox lock poisoned").take()
    }

    /// Place `msg` into the slot.
    ///
    /// Returns `Err(msg)` when the inbox is closed. On success returns the
    /// message that was still pending and got displaced, if any.
    pub(crate) fn offer(&self, msg: T) -> Result<Option<T>, T> {
        let displaced = {
            let mut slot = self.slot.lock().expect("inbox lock poisoned");
            // Checked under the lock so nothing lands after `close` drained.
            if self.closed.load(Ordering::Acquire) {
                return Err(msg);
            }
            slot.replace(msg)
        };
        self.notify.notify_one();
        Ok(displaced)
    }

    /// Wait for the next message.
    ///
    /// Cancel safe: the message is only removed from the slot in the same
    /// poll that returns it.
    pub(crate) async fn recv(&self) -> T {
        loop {
            if let Some(msg) = self.try_take() {
                return msg;
            }
            self.notify.notified().await;
        }
    }

    /// Reject all further offers and drop the pending message.
    pub(crate) fn close(&self) {
        let mut slot = self.slot.lock().expect("inbox lock poisoned");
        self.closed.store(true, Ordering::Release);
        slot.take();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn offer_displaces_pending() {
        let inbox = Inbox::new();
        assert_eq!(inbox.offer(1), Ok(None));
        assert_eq!(inbox.offer(2), Ok(Some(1)));
        assert_eq!(inbox.offer(3), Ok(Some(2)));
        assert_eq!(inbox.try_take(), Some(3));
        assert_eq!(inbox.try_take(), None);
    }

    #[test]
    fn closed_inbox_rejects() {
        let inbox = Inbox::new();
        inbox.offer(1).unwrap();
        inbox.close();
        assert_eq!(inbox.try_take(), None);
        assert_eq!(inbox.offer(2), Err(2));
    }

    #[tokio::test]
    async fn recv_returns_pending_message() {
        let inbox = Inbox::new();
        inbox.offer("a").unwrap();
        assert_eq!(inbox.recv().await, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn recv_wakes_on_offer() {
        let inbox = Arc::new(Inbox::new());
        let rx = Arc::clone(&inbox);
        let handle = tokio::spawn(async move { rx.recv().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        inbox.offer(7).unwrap();
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_wakeup_does_not_return_twice() {
        let inbox = Arc::new(Inbox::new());
        // Two offers, one consumer take: the stored permit from the first
        // offer must not make the second `recv` return without a message.
        inbox.offer(1).unwrap();
        inbox.offer(2).unwrap();
        assert_eq!(inbox.recv().await, 2);

        let rx = Arc::clone(&inbox);
        let pending = tokio::spawn(async move { rx.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!pending.is_finished());

        inbox.offer(3).unwrap();
        assert_eq!(pending.await.unwrap(), 3);
    }
}
