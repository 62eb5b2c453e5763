//! WebSocket Transport
//!
//! `StreamTransport` over `tokio-tungstenite`. Each `open` spawns a task
//! that connects, forwards text frames as events and answers pings, until
//! the server closes, the socket fails or the manager cancels it.
//!
//! Event order for one socket is always `Open`, any number of `Message`,
//! then at most one `Error`, then `Closed`. A failed handshake reports
//! `Error` and `Closed` without `Open`. A cancelled socket sends a Close
//! frame to the server and reports nothing further.

use std::fmt::Display;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    StreamTransport, TransportEvent, TransportEventSender, TransportRequest,
};

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket protocol or I/O error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection manager stopped listening.
    #[error("event receiver dropped")]
    ReceiverDropped,
}

/// How long a released socket waits to hand its Close frame to the server.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a socket that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketEnd {
    /// The server closed the socket or the stream ended.
    ServerClosed,
    /// The manager cancelled the socket.
    Released,
}

/// Production transport backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    /// Create a new transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StreamTransport for TungsteniteTransport {
    fn open(&self, request: TransportRequest) {
        tokio::spawn(run_socket(request));
    }
}

async fn run_socket(request: TransportRequest) {
    let TransportRequest {
        url,
        events,
        cancel,
    } = request;
    let generation = events.generation();

    match connect_and_forward(&url, &events, &cancel).await {
        Ok(SocketEnd::Released) => {
            tracing::debug!(generation, "Stream socket released");
            return;
        }
        Ok(SocketEnd::ServerClosed) => {}
        Err(TransportError::ReceiverDropped) => return,
        Err(e) => {
            if cancel.is_cancelled() {
                return;
            }
            tracing::warn!(generation, error = %e, "Stream socket failed");
            if !events.send(TransportEvent::Error(e.to_string())).await {
                return;
            }
        }
    }

    if !cancel.is_cancelled() {
        let _ = events.send(TransportEvent::Closed).await;
    }
}

/// Connect and forward frames until the socket ends or `cancel` fires.
async fn connect_and_forward(
    url: &str,
    events: &TransportEventSender,
    cancel: &CancellationToken,
) -> Result<SocketEnd, TransportError> {
    tracing::debug!(url = %url, "Opening stream socket");
    let handshake = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(SocketEnd::Released),
        handshake = tokio_tungstenite::connect_async(url) => handshake,
    };
    let (ws_stream, _response) = handshake?;
    let (mut write, mut read) = ws_stream.split();

    deliver(events, TransportEvent::Open).await?;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                send_close(&mut write).await;
                return Ok(SocketEnd::Released);
            }
            next = read.next() => next,
        };
        let Some(msg) = next else { break };

        match msg? {
            Message::Text(text) => {
                deliver(events, TransportEvent::Message(text.to_string())).await?;
            }
            Message::Ping(data) => {
                write.send(Message::Pong(data)).await?;
            }
            Message::Close(frame) => {
                tracing::info!(frame = ?frame, "Server sent close frame");
                return Ok(SocketEnd::ServerClosed);
            }
            _ => {
                // Binance sends text only; binary and pong frames are ignored
            }
        }
    }

    tracing::info!("WebSocket stream ended");
    Ok(SocketEnd::ServerClosed)
}

/// Tell the server we are leaving. Failures only get logged.
async fn send_close<S>(write: &mut S)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match tokio::time::timeout(CLOSE_TIMEOUT, write.send(Message::Close(None))).await {
        Ok(Ok(())) => tracing::debug!("Close frame sent"),
        Ok(Err(e)) => tracing::debug!(error = %e, "Close frame not sent"),
        Err(_) => tracing::debug!("Close frame timed out"),
    }
}

async fn deliver(events: &TransportEventSender, event: TransportEvent) -> Result<(), TransportError> {
    if events.send(event).await {
        Ok(())
    } else {
        Err(TransportError::ReceiverDropped)
    }
}
