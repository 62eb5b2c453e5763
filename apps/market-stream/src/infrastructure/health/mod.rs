//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, stream status reporting, and Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (checks the stream connection)
//!
//! A service that is expected to stream but has no topics yet (for example
//! while the REST seed is still retrying) is reported as not ready.
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::TickerStore;
use crate::domain::streaming::ConnectionState;
use crate::infrastructure::binance::{ManagerSnapshot, StreamClient};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Stream connection status, absent if the manager has stopped.
    pub stream: Option<StreamStatus>,
    /// Number of symbols held in the ticker store.
    pub tickers: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Connected, or idle with nothing to stream and nothing expected.
    Healthy,
    /// Connecting, reconnecting or resubscribing.
    Degraded,
    /// Manager stopped or the socket reported an error.
    Unhealthy,
}

/// Stream connection status.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    /// Connection state.
    pub state: ConnectionState,
    /// Number of desired topics.
    pub topics: usize,
    /// Consecutive failed connection attempts.
    pub reconnect_attempts: u32,
    /// Whether a reconnect is scheduled.
    pub reconnect_pending: bool,
    /// Whether a debounced resubscribe is scheduled.
    pub resubscribe_pending: bool,
}

impl From<&ManagerSnapshot> for StreamStatus {
    fn from(snapshot: &ManagerSnapshot) -> Self {
        Self {
            state: snapshot.state,
            topics: snapshot.topics.len(),
            reconnect_attempts: snapshot.reconnect_attempts,
            reconnect_pending: snapshot.reconnect_pending,
            resubscribe_pending: snapshot.resubscribe_pending,
        }
    }
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    client: StreamClient,
    store: Arc<TickerStore>,
    expects_topics: AtomicBool,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, client: StreamClient, store: Arc<TickerStore>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            client,
            store,
            expects_topics: AtomicBool::new(false),
        }
    }

    /// Mark whether the service should have topics to stream.
    ///
    /// While set, an idle manager with no topics is not ready.
    pub fn expect_topics(&self, expected: bool) {
        self.expects_topics.store(expected, Ordering::Release);
    }

    fn expects_topics(&self) -> bool {
        self.expects_topics.load(Ordering::Acquire)
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state).await;
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let is_ready = state
        .client
        .inspect()
        .await
        .is_ok_and(|snapshot| is_ready(&StreamStatus::from(&snapshot), state.expects_topics()));

    if is_ready {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

async fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let stream = match state.client.inspect().await {
        Ok(snapshot) => Some(StreamStatus::from(&snapshot)),
        Err(e) => {
            tracing::warn!(error = %e, "Stream manager unavailable");
            None
        }
    };

    HealthResponse {
        status: determine_health_status(stream.as_ref(), state.expects_topics()),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        stream,
        tickers: state.store.len(),
    }
}

/// Ready when frames are flowing, or when there is nothing to stream and
/// nothing is expected.
const fn is_ready(stream: &StreamStatus, expects_topics: bool) -> bool {
    stream.state.is_connected()
        || (stream.topics == 0 && !stream.resubscribe_pending && !expects_topics)
}

fn determine_health_status(stream: Option<&StreamStatus>, expects_topics: bool) -> HealthStatus {
    let Some(stream) = stream else {
        return HealthStatus::Unhealthy;
    };

    match stream.state {
        ConnectionState::Error => HealthStatus::Unhealthy,
        _ if is_ready(stream, expects_topics) => HealthStatus::Healthy,
        _ => HealthStatus::Degraded,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports::{NoopSink, StreamTransport, TransportRequest};
    use crate::domain::topic::StreamKind;
    use crate::infrastructure::binance::StreamClientConfig;

    /// Accepts every socket and never reports on it.
    struct SilentTransport;

    impl StreamTransport for SilentTransport {
        fn open(&self, _request: TransportRequest) {}
    }

    fn status(state: ConnectionState, topics: usize) -> StreamStatus {
        StreamStatus {
            state,
            topics,
            reconnect_attempts: 0,
            reconnect_pending: false,
            resubscribe_pending: false,
        }
    }

    fn test_state(cancel: &CancellationToken) -> Arc<HealthServerState> {
        let (client, _handle) = StreamClient::spawn(
            StreamClientConfig::default(),
            SilentTransport,
            Arc::new(NoopSink),
            cancel.clone(),
        );
        Arc::new(HealthServerState::new(
            "test".to_string(),
            client,
            Arc::new(TickerStore::new()),
        ))
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn determine_status_connected() {
        let stream = status(ConnectionState::Connected, 4);
        assert_eq!(determine_health_status(Some(&stream), false), HealthStatus::Healthy);
    }

    #[test]
    fn determine_status_idle_without_topics() {
        let stream = status(ConnectionState::Disconnected, 0);
        assert_eq!(determine_health_status(Some(&stream), false), HealthStatus::Healthy);
    }

    #[test]
    fn determine_status_reconnecting() {
        let mut stream = status(ConnectionState::Disconnected, 2);
        stream.reconnect_pending = true;
        stream.reconnect_attempts = 3;
        assert_eq!(determine_health_status(Some(&stream), false), HealthStatus::Degraded);
    }

    #[test]
    fn determine_status_error_or_stopped() {
        let stream = status(ConnectionState::Error, 2);
        assert_eq!(determine_health_status(Some(&stream), false), HealthStatus::Unhealthy);
        assert_eq!(determine_health_status(None, false), HealthStatus::Unhealthy);
    }

    #[test]
    fn determine_status_idle_while_topics_expected() {
        let stream = status(ConnectionState::Disconnected, 0);
        assert_eq!(determine_health_status(Some(&stream), true), HealthStatus::Degraded);

        let stream = status(ConnectionState::Connected, 3);
        assert_eq!(determine_health_status(Some(&stream), true), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn liveness_is_ok() {
        let cancel = CancellationToken::new();
        let app = router(test_state(&cancel));
        assert_eq!(get_status(app, "/healthz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_when_idle() {
        let cancel = CancellationToken::new();
        let app = router(test_state(&cancel));
        assert_eq!(get_status(app, "/readyz").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn not_ready_without_topics_when_streaming_expected() {
        let cancel = CancellationToken::new();
        let state = test_state(&cancel);
        state.expect_topics(true);

        let app = router(Arc::clone(&state));
        assert_eq!(get_status(app, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);

        let app = router(state);
        assert_eq!(get_status(app, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn not_ready_while_connecting() {
        let cancel = CancellationToken::new();
        let state = test_state(&cancel);
        state
            .client
            .subscribe(&["BTCUSDT"], StreamKind::Ticker)
            .await
            .unwrap();

        let app = router(Arc::clone(&state));
        assert_eq!(get_status(app, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);

        let app = router(state);
        assert_eq!(get_status(app, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn stopped_manager_is_unhealthy() {
        let cancel = CancellationToken::new();
        let state = test_state(&cancel);
        cancel.cancel();
        // Wait for the manager to drop its command receiver
        while state.client.inspect().await.is_ok() {
            tokio::task::yield_now().await;
        }

        let app = router(state);
        assert_eq!(get_status(app, "/health").await, StatusCode::SERVICE_UNAVAILABLE);
    }
}
