//! Relay-side handle for one websocket connection.
//!
//! Frames for a connection go through a bounded queue drained by that
//! connection's writer task. Enqueueing never waits: when the queue is full
//! the peer has stopped reading, so the connection is cancelled and its
//! reader task tears it down like any other disconnect.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct RelayConnection {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl RelayConnection {
    /// Create a connection handle and the receiving end of its outbound queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let connection = Self {
            id: ConnectionId::next(),
            outbound,
            cancel: CancellationToken::new(),
        };
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame without waiting. Returns whether it was queued.
    pub fn enqueue(&self, frame: String) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    connection = %self.id,
                    "Outbound relay queue full, dropping slow connection"
                );
                self.cancel.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection = %self.id, "Outbound relay queue closed");
                false
            }
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_delivers_in_order() {
        let (conn, mut rx) = RelayConnection::new(4);
        assert!(conn.enqueue("a".into()));
        assert!(conn.enqueue("b".into()));
        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_overflow_cancels_connection() {
        let (conn, _rx) = RelayConnection::new(1);
        assert!(conn.enqueue("first".into()));
        assert!(!conn.cancel_token().is_cancelled());
        assert!(!conn.enqueue("second".into()));
        assert!(conn.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_enqueue_after_receiver_dropped_is_not_delivered() {
        let (conn, rx) = RelayConnection::new(2);
        drop(rx);
        assert!(!conn.enqueue("x".into()));
        assert!(!conn.cancel_token().is_cancelled());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let (a, _) = RelayConnection::new(1);
        let (b, _) = RelayConnection::new(1);
        assert_ne!(a.id(), b.id());
    }
}
