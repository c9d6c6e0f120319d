//! Transport abstraction for the availability channel.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport errors. These never reach callers directly; the synchronizer
/// turns them into connection status changes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish a connection
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Connection dropped
    #[error("Connection closed: {0}")]
    Closed(String),
}

/// Inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Message(String),
    /// Peer closed or the connection failed; no frames follow
    Closed(Option<String>),
}

/// One live connection. Sending on `outbound` after the peer has gone is a
/// silent no-op.
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<Frame>,
}

/// Opens connections to the availability server
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<Connection, TransportError>;
}

/// In-process transport for tests
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// Server side of an accepted mock connection
    #[derive(Debug)]
    pub struct ServerEnd {
        /// Frames written by the client
        pub from_client: mpsc::UnboundedReceiver<String>,
        /// Push frames to the client. Dropping it closes the connection.
        pub to_client: mpsc::UnboundedSender<Frame>,
    }

    impl ServerEnd {
        /// Push a text frame to the client
        pub fn push(&self, text: impl Into<String>) -> bool {
            self.to_client.send(Frame::Message(text.into())).is_ok()
        }

        /// Close the connection from the server side
        pub fn close(self, reason: &str) {
            let _ = self.to_client.send(Frame::Closed(Some(reason.to_string())));
        }
    }

    /// Transport whose connections are handed to the test through a channel
    #[derive(Debug)]
    pub struct MockTransport {
        accepted: mpsc::UnboundedSender<ServerEnd>,
        refuse: Mutex<u32>,
        refuse_all: AtomicBool,
        attempts: AtomicU32,
    }

    impl MockTransport {
        /// Create a transport and the receiver of accepted connections
        pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
            let (accepted, rx) = mpsc::unbounded_channel();
            let transport = Self {
                accepted,
                refuse: Mutex::new(0),
                refuse_all: AtomicBool::new(false),
                attempts: AtomicU32::new(0),
            };
            (transport, rx)
        }

        /// Refuse the next `n` connection attempts
        pub fn refuse_next(&self, n: u32) {
            *self.refuse.lock().unwrap_or_else(PoisonError::into_inner) = n;
        }

        /// Refuse every attempt until cleared
        pub fn refuse_all(&self, refuse: bool) {
            self.refuse_all.store(refuse, Ordering::SeqCst);
        }

        /// Connection attempts so far, successful or not
        pub fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&self) -> Result<Connection, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            if self.refuse_all.load(Ordering::SeqCst) {
                return Err(TransportError::Connect("connection refused".to_string()));
            }
            {
                let mut refuse = self.refuse.lock().unwrap_or_else(PoisonError::into_inner);
                if *refuse > 0 {
                    *refuse -= 1;
                    return Err(TransportError::Connect("connection refused".to_string()));
                }
            }

            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            self.accepted
                .send(ServerEnd {
                    from_client: out_rx,
                    to_client: in_tx,
                })
                .map_err(|_| TransportError::Connect("no listener".to_string()))?;

            Ok(Connection {
                outbound: out_tx,
                inbound: in_rx,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_round_trip() {
        let (transport, mut accepted) = MockTransport::new();
        let mut conn = transport.connect().await.unwrap();
        let mut server = accepted.recv().await.unwrap();

        conn.outbound.send("hello".to_string()).unwrap();
        assert_eq!(server.from_client.recv().await.unwrap(), "hello");

        assert!(server.push("world"));
        assert_eq!(
            conn.inbound.recv().await.unwrap(),
            Frame::Message("world".to_string())
        );

        drop(server);
        assert_eq!(conn.inbound.recv().await, None);
    }

    #[tokio::test]
    async fn test_mock_transport_refusals() {
        let (transport, _accepted) = MockTransport::new();
        transport.refuse_next(2);
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_ok());
        assert_eq!(transport.attempts(), 3);
    }
}
