//! Connection handles
//!
//! The relay core never touches sockets. It talks to a [`Connection`]: an id,
//! a client address, a way to send an envelope, and a way to notice that the
//! other end is gone. The WebSocket transport and the tests both use
//! [`ChannelConnection`], whose outbound queue is drained by whoever owns the
//! receiving half.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::error::SendError;
use crate::protocol::ServerMessage;

/// Unique ID for one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Client network address as reported by the transport.
    fn addr(&self) -> &str;

    /// Queue an envelope for this client without waiting. Fails once the
    /// client is gone or its queue is full.
    fn send(&self, message: ServerMessage) -> Result<(), SendError>;

    fn is_closed(&self) -> bool;
}

/// Shared reference to a live connection, as stored in the registry.
pub type ConnectionHandle = Arc<dyn Connection>;

/// A [`Connection`] backed by a bounded mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    id: ConnectionId,
    addr: String,
    tx: mpsc::Sender<ServerMessage>,
}

impl ChannelConnection {
    /// Create a connection and the receiver its outbound envelopes arrive on.
    /// Dropping the receiver closes the connection.
    pub fn new(
        addr: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Self {
            id: ConnectionId::new(),
            addr: addr.into(),
            tx,
        };
        (conn, rx)
    }

    pub fn into_handle(self) -> ConnectionHandle {
        Arc::new(self)
    }
}

impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn addr(&self) -> &str {
        &self.addr
    }

    fn send(&self, message: ServerMessage) -> Result<(), SendError> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full(self.id),
            TrySendError::Closed(_) => SendError::Closed(self.id),
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_receiver() {
        let (conn, mut rx) = ChannelConnection::new("127.0.0.1", 4);
        conn.send(ServerMessage::Message {
            sender: "Alice".to_string(),
            message: "hi".to_string(),
        })
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind(), "message");
        assert_eq!(conn.addr(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_fails() {
        let (conn, rx) = ChannelConnection::new("127.0.0.1", 4);
        assert!(!conn.is_closed());
        drop(rx);
        assert!(conn.is_closed());

        let err = conn
            .send(ServerMessage::StartChat {
                with: "Bob".to_string(),
                ip: "127.0.0.1".to_string(),
            })
            .unwrap_err();
        assert_eq!(err, SendError::Closed(conn.id()));
    }

    #[tokio::test]
    async fn test_send_to_full_queue_fails_without_waiting() {
        let (conn, mut rx) = ChannelConnection::new("127.0.0.1", 1);
        let msg = ServerMessage::Message {
            sender: "Alice".to_string(),
            message: "hi".to_string(),
        };
        conn.send(msg.clone()).unwrap();

        let err = conn.send(msg.clone()).unwrap_err();
        assert_eq!(err, SendError::Full(conn.id()));
        assert_eq!(err.error_code(), "queue_full");

        // Draining frees the slot again
        assert_eq!(rx.recv().await.unwrap(), msg);
        conn.send(msg).unwrap();
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _rx_a) = ChannelConnection::new("a", 1);
        let (b, _rx_b) = ChannelConnection::new("b", 1);
        assert_ne!(a.id(), b.id());
    }
}
