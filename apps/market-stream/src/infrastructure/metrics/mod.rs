//! Prometheus Metrics Module
//!
//! Stream client metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: Frames delivered to the sink by kind, frames dropped by reason
//! - **Connection**: Current connection state, reconnects, transport errors
//! - **Subscriptions**: Number of desired topics
//! - **REST**: Snapshot request retries by reason, records skipped by kind
//! - **Latency**: Frame decode and dispatch time
//!
//! Recording functions are no-ops until `init_metrics` installs a recorder.
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::streaming::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, or return the handle of the one
/// already installed.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "market_stream_frames_received_total",
        "Frames normalized and delivered to the sink"
    );
    describe_counter!(
        "market_stream_frames_dropped_total",
        "Frames dropped, by reason"
    );
    describe_counter!(
        "market_stream_reconnects_total",
        "Reconnects scheduled after an unplanned close"
    );
    describe_counter!(
        "market_stream_transport_errors_total",
        "Socket-level errors reported by the transport"
    );
    describe_counter!(
        "market_stream_rest_retries_total",
        "REST snapshot request retries, by reason"
    );
    describe_counter!(
        "market_stream_rest_records_dropped_total",
        "REST snapshot records skipped for an unparseable field, by kind"
    );

    describe_gauge!(
        "market_stream_connection_state",
        "Connection state (0=disconnected, 1=connecting, 2=connected, 3=error)"
    );
    describe_gauge!(
        "market_stream_subscribed_topics",
        "Number of desired stream topics"
    );

    describe_histogram!(
        "market_stream_frame_processing_seconds",
        "Time to decode, normalize and dispatch one frame"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a frame delivered to the sink.
pub fn record_frame_received(kind: &'static str) {
    counter!("market_stream_frames_received_total", "kind" => kind).increment(1);
}

/// Record a dropped frame.
pub fn record_frame_dropped(reason: &'static str) {
    counter!("market_stream_frames_dropped_total", "reason" => reason).increment(1);
}

/// Record a scheduled reconnect.
pub fn record_reconnect() {
    counter!("market_stream_reconnects_total").increment(1);
}

/// Record a transport error.
pub fn record_transport_error() {
    counter!("market_stream_transport_errors_total").increment(1);
}

/// Record a REST retry.
pub fn record_rest_retry(reason: &'static str) {
    counter!("market_stream_rest_retries_total", "reason" => reason).increment(1);
}

/// Record a REST snapshot record skipped during normalization.
pub fn record_rest_record_dropped(kind: &'static str) {
    counter!("market_stream_rest_records_dropped_total", "kind" => kind).increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("market_stream_connection_state").set(state.as_gauge());
}

/// Update the subscribed topic gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribed_topics(count: usize) {
    gauge!("market_stream_subscribed_topics").set(count as f64);
}

/// Record frame processing duration.
pub fn record_frame_processing(duration: Duration) {
    histogram!("market_stream_frame_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
