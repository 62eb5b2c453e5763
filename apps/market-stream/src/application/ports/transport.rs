//! Stream Transport Port
//!
//! Abstracts the socket so the connection manager can be driven by any
//! transport: the tungstenite adapter in production, an in-memory fake in
//! tests.
//!
//! A transport reports what happens to one socket through the
//! `TransportEventSender` it was handed. Every sender is stamped with the
//! generation of the socket it belongs to, which lets the manager ignore
//! late events from a socket it has already released.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Lifecycle and data events from one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is open.
    Open,
    /// A text frame arrived.
    Message(String),
    /// The socket failed. A `Closed` event follows.
    Error(String),
    /// The socket is closed.
    Closed,
}

/// Sending half for one socket's events.
#[derive(Debug, Clone)]
pub struct TransportEventSender {
    generation: u64,
    tx: mpsc::Sender<(u64, TransportEvent)>,
}

impl TransportEventSender {
    /// Create a sender for the socket with the given generation.
    #[must_use]
    pub const fn new(generation: u64, tx: mpsc::Sender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the socket this sender belongs to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event, waiting for channel capacity.
    ///
    /// Returns `false` once the connection manager has stopped.
    pub async fn send(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).await.is_ok()
    }

    /// Deliver an event without waiting.
    ///
    /// Returns `false` if the channel is full or the manager has stopped.
    pub fn try_send(&self, event: TransportEvent) -> bool {
        self.tx.try_send((self.generation, event)).is_ok()
    }
}

/// Everything a transport needs to open one socket.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Full stream URL including the encoded topic list.
    pub url: String,
    /// Where to report socket events.
    pub events: TransportEventSender,
    /// Cancelled when the manager releases the socket.
    pub cancel: CancellationToken,
}

/// Opens stream sockets.
///
/// `open` must not block: implementations start the connection in the
/// background and report progress through `request.events`. Once
/// `request.cancel` fires the socket must be closed and no further events
/// are expected.
pub trait StreamTransport: Send + Sync + 'static {
    /// Start opening a socket for `request.url`.
    fn open(&self, request: TransportRequest);
}
