//! In-process connection pair.
//!
//! Each end implements [`Connection`]; whatever one side sends, the other
//! receives. Closing either end closes both.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};

use crate::{Connection, ConnectionId, TransportError};

/// One end of an in-memory connection pair.
pub struct MemoryConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: Arc<watch::Sender<bool>>,
}

impl MemoryConnection {
    /// Creates two connected ends, each with a fresh [`ConnectionId`].
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let closed = Arc::new(closed);

        let a = Self {
            id: ConnectionId::next(),
            tx: a_tx,
            rx: Mutex::new(a_rx),
            closed: Arc::clone(&closed),
        };
        let b = Self {
            id: ConnectionId::next(),
            tx: b_tx,
            rx: Mutex::new(b_rx),
            closed,
        };
        (a, b)
    }

    /// Returns `true` once either end has been closed.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed(format!("{} is closed", self.id)));
        }
        self.tx
            .send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed(format!("peer of {} dropped", self.id)))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            msg = rx.recv() => Ok(msg),
            _ = async { let _ = closed.wait_for(|c| *c).await; } => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_both_ways() {
        let (a, b) = MemoryConnection::pair();
        a.send(b"ping").await.unwrap();
        b.send(b"pong").await.unwrap();
        assert_eq!(b.recv().await.unwrap().as_deref(), Some(&b"ping"[..]));
        assert_eq!(a.recv().await.unwrap().as_deref(), Some(&b"pong"[..]));
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_close_wakes_pending_recv_on_peer() {
        let (a, b) = MemoryConnection::pair();
        let b = Arc::new(b);
        let reader = {
            let b = Arc::clone(&b);
            tokio::spawn(async move { b.recv().await })
        };
        tokio::task::yield_now().await;
        a.close().await.unwrap();
        assert_eq!(reader.await.unwrap().unwrap(), None);
        assert!(b.is_closed());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (a, _b) = MemoryConnection::pair();
        a.close().await.unwrap();
        a.close().await.unwrap();
        assert!(matches!(
            a.send(b"late").await,
            Err(TransportError::ConnectionClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_peer_reads_as_closed() {
        let (a, b) = MemoryConnection::pair();
        drop(a);
        assert_eq!(b.recv().await.unwrap(), None);
        assert!(b.send(b"x").await.is_err());
    }
}
