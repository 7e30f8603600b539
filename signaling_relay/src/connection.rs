//! Handle to one peer's duplex message channel
//!
//! The transport owns the socket; the relay only ever sees a [`Connection`],
//! which wraps the sending half of a bounded outbound queue drained by the
//! transport's writer task, plus a shared open/closed flag.

use crate::error::SignalingError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of a single transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub Uuid);

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
        write!(f, "{}", self.0)
    }
}

/// Cloneable handle used to enqueue messages for one peer
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<Arc<str>>,
    open: Arc<AtomicBool>,
}

impl Connection {
    /// Create a handle and the receiving end the transport writer drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let connection = Self {
            id: ConnectionId::new(),
            tx,
            open: Arc::new(AtomicBool::new(true)),
        };
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the transport can still accept messages for this peer
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Mark the connection closed. Later sends fail fast.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Enqueue a message without waiting.
    ///
    /// A full queue means the peer is not keeping up; the message is dropped
    /// for this peer only.
    pub fn send(&self, message: Arc<str>) -> Result<(), SignalingError> {
        if !self.is_open() {
            return Err(SignalingError::ConnectionClosed);
        }
        self.tx.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SignalingError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => {
                self.close();
                SignalingError::ConnectionClosed
            }
        })
    }
}
