//! Registry-side handle of one websocket session.
//!
//! The handle owns the only sender of the session's bounded outbound queue.
//! Closing the queue drops that sender, which is how the write pump learns it
//! should flush what is left, send a close frame and stop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use agora_core::{ConnectionId, Message, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Result of a non-blocking enqueue.
#[derive(Debug)]
pub enum Enqueue {
    /// The message is in the queue.
    Enqueued,
    /// The queue is at capacity; the message was not accepted.
    Full(Message),
    /// The queue was closed or its write pump is gone.
    Closed(Message),
}

/// One accepted connection bound to a verified user.
#[derive(Debug)]
pub struct SessionHandle {
    /// Unique per accepted socket.
    pub id: ConnectionId,
    /// The verified user this socket belongs to.
    pub user_id: UserId,
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    connected_at: Instant,
    enqueued: AtomicU64,
}

impl SessionHandle {
    /// Create a handle with an outbound queue of `capacity` messages.
    ///
    /// Returns the handle and the receiving end for the write pump.
    pub fn new(user_id: UserId, capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            user_id,
            outbound: Mutex::new(Some(tx)),
            connected_at: Instant::now(),
            enqueued: AtomicU64::new(0),
        };
        (handle, rx)
    }

    /// Try to append `message` to the outbound queue without waiting.
    pub fn try_enqueue(&self, message: Message) -> Enqueue {
        let guard = self.outbound.lock();
        let Some(tx) = guard.as_ref() else {
            return Enqueue::Closed(message);
        };
        match tx.try_send(message) {
            Ok(()) => {
                let _ = self.enqueued.fetch_add(1, Ordering::Relaxed);
                Enqueue::Enqueued
            }
            Err(mpsc::error::TrySendError::Full(m)) => Enqueue::Full(m),
            Err(mpsc::error::TrySendError::Closed(m)) => Enqueue::Closed(m),
        }
    }

    /// Close the outbound queue. Returns `true` if this call closed it.
    pub fn close_queue(&self) -> bool {
        self.outbound.lock().take().is_some()
    }

    /// Whether the outbound queue has been closed (or its receiver dropped).
    pub fn is_closed(&self) -> bool {
        self.outbound.lock().as_ref().is_none_or(mpsc::Sender::is_closed)
    }

    /// Messages accepted into the queue so far.
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Time since the socket was accepted.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{Event, TypingNotice};
    use assert_matches::assert_matches;

    fn typing(to: i64, from: i64) -> Message {
        Message::new(
            UserId::new(to),
            Event::Typing(TypingNotice {
                conversation_id: 1,
                user_id: UserId::new(from),
                is_typing: true,
            }),
        )
    }

    #[tokio::test]
    async fn enqueue_then_receive() {
        let (handle, mut rx) = SessionHandle::new(UserId::new(7), 4);
        assert_matches!(handle.try_enqueue(typing(7, 9)), Enqueue::Enqueued);
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg, typing(7, 9));
        assert_eq!(handle.enqueued_count(), 1);
    }

    #[test]
    fn full_queue_returns_message() {
        let (handle, _rx) = SessionHandle::new(UserId::new(7), 1);
        assert_matches!(handle.try_enqueue(typing(7, 1)), Enqueue::Enqueued);
        assert_matches!(handle.try_enqueue(typing(7, 2)), Enqueue::Full(m) => {
            assert_eq!(m, typing(7, 2));
        });
    }

    #[test]
    fn closed_queue_rejects() {
        let (handle, _rx) = SessionHandle::new(UserId::new(7), 4);
        assert!(handle.close_queue());
        assert!(handle.is_closed());
        assert_matches!(handle.try_enqueue(typing(7, 1)), Enqueue::Closed(_));
    }

    #[test]
    fn close_is_idempotent() {
        let (handle, _rx) = SessionHandle::new(UserId::new(7), 4);
        assert!(handle.close_queue());
        assert!(!handle.close_queue());
    }

    #[test]
    fn dropped_receiver_counts_as_closed() {
        let (handle, rx) = SessionHandle::new(UserId::new(7), 4);
        drop(rx);
        assert!(handle.is_closed());
        assert_matches!(handle.try_enqueue(typing(7, 1)), Enqueue::Closed(_));
    }

    #[tokio::test]
    async fn closing_lets_receiver_drain_then_end() {
        let (handle, mut rx) = SessionHandle::new(UserId::new(7), 4);
        let _ = handle.try_enqueue(typing(7, 1));
        let _ = handle.try_enqueue(typing(7, 2));
        let _ = handle.close_queue();

        assert_eq!(rx.recv().await.unwrap(), typing(7, 1));
        assert_eq!(rx.recv().await.unwrap(), typing(7, 2));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (handle, _rx) = SessionHandle::new(UserId::new(1), 0);
        assert_matches!(handle.try_enqueue(typing(1, 2)), Enqueue::Enqueued);
    }

    #[test]
    fn each_handle_gets_its_own_id() {
        let (a, _ra) = SessionHandle::new(UserId::new(1), 1);
        let (b, _rb) = SessionHandle::new(UserId::new(1), 1);
        assert_ne!(a.id, b.id);
    }
}
