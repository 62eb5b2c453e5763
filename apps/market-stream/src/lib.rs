#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Market Stream - Binance Multiplexed Stream Client
//!
//! Keeps a single WebSocket connection to Binance's combined stream endpoint
//! carrying every topic the application wants, and hands normalized ticker
//! and kline records to a consumer.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Topics, the desired-subscription set and market data records
//!   - `topic`: Topic derivation and stream kind classification
//!   - `subscription`: Desired-subscription tracking
//!   - `streaming`: Tickers, klines and connection state
//!
//! - **Application**: Port definitions and consumer-side services
//!   - `ports`: Update sink, transport, flush scheduler, snapshot source
//!   - `services`: Ticker store, batched ticker sink and snapshot seeder
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: Connection manager, codec, normalizer, REST snapshots
//!   - `config`: Environment-driven settings
//!   - `health`: Health check HTTP endpoint
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Logging and trace export
//!
//! # Data Flow
//!
//! ```text
//! subscribe/unsubscribe ──► ConnectionManager ──► StreamTransport (1 socket)
//!                                 ▲                      │
//!                                 └──── TransportEvent ◄─┘
//!                                 │
//!                     StreamCodec ─► normalize ─► UpdateSink ─► TickerStore
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no external dependencies.
pub mod domain;

/// Application layer - Ports and consumer-side services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{ConnectionState, FieldParseError, Kline, KlineUpdate, Ticker};
pub use domain::subscription::SubscriptionSet;
pub use domain::topic::{StreamKind, Topic};

// Ports and services
pub use application::ports::{
    CallbackSink, FlushScheduler, FlushTask, NoopSink, SnapshotError, StreamError,
    StreamTransport, TickerSnapshotPort, TransportEvent, TransportEventSender, TransportRequest,
    UpdateSink,
};
pub use application::services::{
    BatchedTickerSink, CoalescingQueue, IntervalFlushScheduler, SeedTarget, SnapshotSeeder,
    TickerStore,
};

// Binance adapters
pub use infrastructure::binance::{
    BackoffConfig, BackoffPolicy, ClientError, KlineQuery, ManagerSnapshot, RestConfig,
    RestError, RestSnapshotClient, StreamClient, StreamClientConfig, TungsteniteTransport,
    build_stream_url,
};

// Infrastructure config
pub use infrastructure::config::{
    AppConfig, ConfigError, RestSettings, ServerSettings, StreamSettings,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
