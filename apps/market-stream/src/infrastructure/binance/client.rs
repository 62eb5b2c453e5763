//! Stream Client
//!
//! Owns the single multiplexed socket to the combined stream endpoint and
//! keeps it in line with the caller's subscription set.
//!
//! # Architecture
//!
//! One task (the connection manager) owns all mutable state: the
//! subscription set, the connection state, the reconnect counter, the
//! socket handle and both timers. Everything that can change that state
//! arrives as a message:
//!
//! ```text
//! StreamClient ──Command──▶ ┌────────────────────┐ ──▶ UpdateSink
//!                           │ ConnectionManager  │
//! StreamTransport ─Event──▶ └────────────────────┘ ──▶ watch<ConnectionState>
//! ```
//!
//! Timers are plain deadlines in the manager, so there is never more than
//! one pending reconnect or resubscribe, and replacing a deadline cancels
//! the old one.
//!
//! # Topic Changes
//!
//! The combined stream takes its topic list in the URL, so changing topics
//! means reconnecting. Subscribe/unsubscribe calls on a live connection
//! tear the socket down and reopen it after a quiet period; a burst of calls
//! inside that period collapses into a single reopen carrying every topic.
//!
//! # Socket Ownership
//!
//! Each opened socket gets a generation number. Releasing a socket cancels
//! its token and forgets its generation, so any events it still emits are
//! ignored. This is what keeps an intentional `disconnect()` from being
//! followed by an automatic reconnect.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    StreamError, StreamTransport, TransportEvent, TransportEventSender, TransportRequest,
    UpdateSink,
};
use crate::domain::streaming::ConnectionState;
use crate::domain::subscription::SubscriptionSet;
use crate::domain::topic::{StreamKind, Topic};
use crate::infrastructure::binance::backoff::{BackoffConfig, BackoffPolicy};
use crate::infrastructure::binance::codec::{StreamCodec, StreamFrame};
use crate::infrastructure::binance::normalize;
use crate::infrastructure::metrics;

/// Combined stream endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://stream.binance.com:9443/stream";

/// Quiet period before reopening after a topic change.
pub const DEFAULT_RESUBSCRIBE_DEBOUNCE: Duration = Duration::from_millis(300);

// =============================================================================
// Configuration
// =============================================================================

/// Stream client configuration.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Combined stream endpoint, without query string.
    pub base_url: String,
    /// Reconnect backoff.
    pub backoff: BackoffConfig,
    /// Quiet period before reopening after a topic change.
    pub resubscribe_debounce: Duration,
    /// Capacity of the command channel.
    pub command_buffer: usize,
    /// Capacity of the transport event channel.
    pub event_buffer: usize,
}

impl Default for StreamClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STREAM_URL.to_string(),
            backoff: BackoffConfig::default(),
            resubscribe_debounce: DEFAULT_RESUBSCRIBE_DEBOUNCE,
            command_buffer: 64,
            event_buffer: 1024,
        }
    }
}

impl StreamClientConfig {
    /// Create configuration from `StreamSettings`.
    #[must_use]
    pub fn from_stream_settings(settings: &crate::StreamSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            backoff: BackoffConfig::from_stream_settings(settings),
            resubscribe_debounce: settings.resubscribe_debounce,
            ..Self::default()
        }
    }
}

/// Build the connection URL for a topic list.
///
/// An empty list yields the bare endpoint.
///
/// ```rust
/// use market_stream::domain::topic::{StreamKind, Topic};
/// use market_stream::infrastructure::binance::client::build_stream_url;
///
/// let topics = Topic::for_symbols(&["BTCUSDT", "ETHUSDT"], StreamKind::Ticker);
/// assert_eq!(
///     build_stream_url("wss://example.test/stream", &topics),
///     "wss://example.test/stream?streams=btcusdt@ticker/ethusdt@ticker"
/// );
/// assert_eq!(build_stream_url("wss://example.test/stream", &[]), "wss://example.test/stream");
/// ```
#[must_use]
pub fn build_stream_url(base_url: &str, topics: &[Topic]) -> String {
    if topics.is_empty() {
        return base_url.to_string();
    }
    let streams: Vec<&str> = topics.iter().map(Topic::as_str).collect();
    format!("{base_url}?streams={}", streams.join("/"))
}

// =============================================================================
// Errors and Diagnostics
// =============================================================================

/// Stream client errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The connection manager task has exited.
    #[error("connection manager stopped")]
    ManagerStopped,
}

/// Point-in-time view of the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSnapshot {
    /// Current connection state.
    pub state: ConnectionState,
    /// Reconnects scheduled since the last successful open.
    pub reconnect_attempts: u32,
    /// Whether a reconnect timer is pending.
    pub reconnect_pending: bool,
    /// Whether a debounced resubscribe is pending.
    pub resubscribe_pending: bool,
    /// Desired topics, in URL order.
    pub topics: Vec<Topic>,
    /// URL of the socket currently held, if any.
    pub url: Option<String>,
}

// =============================================================================
// Client Handle
// =============================================================================

enum Command {
    Subscribe {
        topics: Vec<Topic>,
        ack: oneshot::Sender<()>,
    },
    Unsubscribe {
        topics: Vec<Topic>,
        ack: oneshot::Sender<()>,
    },
    Connect {
        ack: oneshot::Sender<()>,
    },
    Disconnect {
        ack: oneshot::Sender<()>,
    },
    Inspect {
        reply: oneshot::Sender<ManagerSnapshot>,
    },
}

/// Handle to a running connection manager.
///
/// Cheap to clone. Each async method resolves once the manager has applied
/// the request; the resulting socket activity happens in the background.
#[derive(Debug, Clone)]
pub struct StreamClient {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectionState>,
}

impl StreamClient {
    /// Spawn a connection manager on the current tokio runtime.
    ///
    /// The manager runs until `cancel` fires or every handle is dropped.
    /// It starts disconnected; the first subscribe opens the socket.
    pub fn spawn<T>(
        config: StreamClientConfig,
        transport: T,
        sink: Arc<dyn UpdateSink>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>)
    where
        T: StreamTransport,
    {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(ConnectionState::Disconnected);

        let manager = ConnectionManager {
            backoff: BackoffPolicy::new(config.backoff),
            config,
            transport,
            sink,
            codec: StreamCodec::new(),
            subscriptions: SubscriptionSet::new(),
            state: ConnectionState::Disconnected,
            status_tx,
            reconnect_attempts: 0,
            reconnect_at: None,
            resubscribe_at: None,
            socket: None,
            next_generation: 0,
            event_tx,
            shutdown: cancel,
        };

        let handle = tokio::spawn(manager.run(command_rx, event_rx));

        (
            Self {
                commands: command_tx,
                status: status_rx,
            },
            handle,
        )
    }

    /// Add topics for `symbols` and bring the socket in line.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has stopped.
    pub async fn subscribe<S: AsRef<str>>(
        &self,
        symbols: &[S],
        kind: StreamKind,
    ) -> Result<(), ClientError> {
        let topics = Topic::for_symbols(symbols, kind);
        self.request(|ack| Command::Subscribe { topics, ack }).await
    }

    /// Remove topics for `symbols` and bring the socket in line.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has stopped.
    pub async fn unsubscribe<S: AsRef<str>>(
        &self,
        symbols: &[S],
        kind: StreamKind,
    ) -> Result<(), ClientError> {
        let topics = Topic::for_symbols(symbols, kind);
        self.request(|ack| Command::Unsubscribe { topics, ack })
            .await
    }

    /// Open the socket for the current topics unless already connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has stopped.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.request(|ack| Command::Connect { ack }).await
    }

    /// Close the socket and cancel any pending reconnect or resubscribe.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has stopped.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.request(|ack| Command::Disconnect { ack }).await
    }

    /// Snapshot of the manager's state.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has stopped.
    pub async fn inspect(&self) -> Result<ManagerSnapshot, ClientError> {
        self.request(|reply| Command::Inspect { reply }).await
    }

    /// Last reported connection state.
    ///
    /// A socket that was just opened reports `Connecting` until its open
    /// event has been processed.
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        *self.status.borrow()
    }

    /// Receiver that observes every state transition.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.status.clone()
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| ClientError::ManagerStopped)?;
        rx.await.map_err(|_| ClientError::ManagerStopped)
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

/// The socket currently owned by the manager. Dropping it releases the socket.
#[derive(Debug)]
struct SocketHandle {
    generation: u64,
    cancel: CancellationToken,
    url: String,
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ConnectionManager<T> {
    config: StreamClientConfig,
    transport: T,
    sink: Arc<dyn UpdateSink>,
    codec: StreamCodec,
    backoff: BackoffPolicy,
    subscriptions: SubscriptionSet,
    state: ConnectionState,
    status_tx: watch::Sender<ConnectionState>,
    reconnect_attempts: u32,
    reconnect_at: Option<Instant>,
    resubscribe_at: Option<Instant>,
    socket: Option<SocketHandle>,
    next_generation: u64,
    event_tx: mpsc::Sender<(u64, TransportEvent)>,
    shutdown: CancellationToken,
}

impl<T: StreamTransport> ConnectionManager<T> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<(u64, TransportEvent)>,
    ) {
        tracing::debug!(base_url = %self.config.base_url, "Stream client started");
        let shutdown = self.shutdown.clone();

        loop {
            let reconnect_at = self.reconnect_at;
            let resubscribe_at = self.resubscribe_at;

            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Stream client cancelled");
                    break;
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("All stream client handles dropped");
                        break;
                    };
                    self.handle_command(command);
                }
                Some((generation, event)) = events.recv() => {
                    self.handle_transport_event(generation, event);
                }
                () = wait_until(reconnect_at) => {
                    self.reconnect_at = None;
                    tracing::info!(
                        attempt = self.reconnect_attempts,
                        "Reconnecting to stream"
                    );
                    self.connect();
                }
                () = wait_until(resubscribe_at) => {
                    self.resubscribe_at = None;
                    tracing::debug!(topics = self.subscriptions.len(), "Resubscribing");
                    self.connect();
                }
            }
        }

        self.reconnect_at = None;
        self.resubscribe_at = None;
        self.socket = None;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Stream client stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe { topics, ack } => {
                self.subscribe(topics);
                let _ = ack.send(());
            }
            Command::Unsubscribe { topics, ack } => {
                self.unsubscribe(&topics);
                let _ = ack.send(());
            }
            Command::Connect { ack } => {
                self.connect();
                let _ = ack.send(());
            }
            Command::Disconnect { ack } => {
                self.disconnect();
                let _ = ack.send(());
            }
            Command::Inspect { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    fn subscribe(&mut self, topics: Vec<Topic>) {
        let added = self.subscriptions.add(topics);
        metrics::set_subscribed_topics(self.subscriptions.len());

        let resubscribe_pending = self.resubscribe_at.is_some();
        if added == 0 && (self.socket.is_some() || resubscribe_pending) {
            tracing::debug!("Subscribe added no topics");
            return;
        }

        if self.state.is_connected() || resubscribe_pending {
            self.schedule_resubscribe();
        } else {
            self.connect();
        }
    }

    fn unsubscribe(&mut self, topics: &[Topic]) {
        let removed = self.subscriptions.remove(topics);
        metrics::set_subscribed_topics(self.subscriptions.len());

        if self.subscriptions.is_empty() {
            tracing::debug!("Last topic removed, disconnecting");
            self.disconnect();
        } else if removed > 0 {
            self.schedule_resubscribe();
        }
    }

    fn connect(&mut self) {
        if self.state.is_connected() {
            return;
        }

        self.reconnect_at = None;
        self.resubscribe_at = None;
        self.release_socket();
        self.set_state(ConnectionState::Connecting);

        let url = build_stream_url(&self.config.base_url, &self.subscriptions.snapshot());
        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = self.shutdown.child_token();

        tracing::info!(url = %url, generation, "Connecting to stream");

        self.transport.open(TransportRequest {
            url: url.clone(),
            events: TransportEventSender::new(generation, self.event_tx.clone()),
            cancel: cancel.clone(),
        });

        self.socket = Some(SocketHandle {
            generation,
            cancel,
            url,
        });
    }

    fn disconnect(&mut self) {
        self.reconnect_at = None;
        self.resubscribe_at = None;
        self.release_socket();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Tear the socket down now and reopen after the quiet period.
    ///
    /// A pending resubscribe is replaced, not stacked.
    fn schedule_resubscribe(&mut self) {
        self.reconnect_at = None;
        self.release_socket();
        self.set_state(ConnectionState::Disconnected);

        let debounce = self.config.resubscribe_debounce;
        self.resubscribe_at = Some(Instant::now() + debounce);
        tracing::debug!(
            debounce_ms = debounce.as_millis(),
            "Resubscribe scheduled"
        );
    }

    fn schedule_reconnect(&mut self) {
        if self.subscriptions.is_empty() {
            tracing::debug!("No topics, not reconnecting");
            return;
        }
        // Only a close on the live socket gets here, and it clears the socket
        // first, so no deadline can be pending yet.
        debug_assert!(self.reconnect_at.is_none());

        let delay = self.backoff.delay(self.reconnect_attempts);
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.reconnect_at = Some(Instant::now() + delay);
        metrics::record_reconnect();

        tracing::info!(
            attempt = self.reconnect_attempts,
            delay_ms = delay.as_millis(),
            "Reconnect scheduled"
        );
    }

    fn release_socket(&mut self) {
        if let Some(socket) = self.socket.take() {
            tracing::debug!(generation = socket.generation, "Releasing stream socket");
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, "Connection state changed");
        self.state = state;
        self.status_tx.send_replace(state);
        metrics::set_connection_state(state);
        self.sink.on_status_change(state);
    }

    fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            state: self.state,
            reconnect_attempts: self.reconnect_attempts,
            reconnect_pending: self.reconnect_at.is_some(),
            resubscribe_pending: self.resubscribe_at.is_some(),
            topics: self.subscriptions.snapshot(),
            url: self.socket.as_ref().map(|socket| socket.url.clone()),
        }
    }

    // -------------------------------------------------------------------------
    // Transport Events
    // -------------------------------------------------------------------------

    fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        let current = self.socket.as_ref().map(|socket| socket.generation);
        if current != Some(generation) {
            tracing::trace!(generation, ?current, "Ignoring event from released socket");
            return;
        }

        match event {
            TransportEvent::Open => {
                tracing::info!(generation, "Stream connected");
                self.reconnect_attempts = 0;
                self.set_state(ConnectionState::Connected);
            }
            TransportEvent::Message(text) => self.route(&text),
            TransportEvent::Error(message) => {
                tracing::warn!(error = %message, "Stream transport error");
                metrics::record_transport_error();
                self.set_state(ConnectionState::Error);
                self.sink.on_error(&StreamError::Transport(message));
            }
            TransportEvent::Closed => {
                tracing::info!(generation, "Stream closed");
                self.socket = None;
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    fn route(&self, text: &str) {
        let started = std::time::Instant::now();

        match self.codec.decode(text) {
            Ok(StreamFrame::Ticker { payload, .. }) => match normalize::stream_ticker(&payload) {
                Ok(ticker) => {
                    metrics::record_frame_received("ticker");
                    self.sink.on_ticker(ticker);
                }
                Err(e) => self.report_dropped("field_parse", e.into()),
            },
            Ok(StreamFrame::Kline { payload, .. }) => match normalize::stream_kline(&payload) {
                Ok(update) => {
                    metrics::record_frame_received("kline");
                    self.sink.on_kline(update);
                }
                Err(e) => self.report_dropped("field_parse", e.into()),
            },
            Ok(StreamFrame::Unknown { stream }) => {
                tracing::trace!(stream = ?stream, "Ignoring frame for unhandled stream");
                metrics::record_frame_dropped("unknown_stream");
            }
            Err(e) => self.report_dropped("protocol", e.into()),
        }

        metrics::record_frame_processing(started.elapsed());
    }

    fn report_dropped(&self, reason: &'static str, error: StreamError) {
        tracing::debug!(error = %error, reason, "Dropping stream frame");
        metrics::record_frame_dropped(reason);
        self.sink.on_error(&error);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
