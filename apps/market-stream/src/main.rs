//! Market Stream Binary
//!
//! Seeds a ticker store from the REST snapshot, then keeps it current from
//! the multiplexed Binance stream. Without `STREAM_SYMBOLS` the streamed
//! symbols come from the top-volume snapshot, retried until it loads.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin market-stream
//! ```
//!
//! # Environment Variables
//!
//! - `STREAM_SYMBOLS`: Comma-separated symbols (default: REST top-volume list)
//! - `BINANCE_WS_BASE_URL`: Combined stream endpoint
//! - `BINANCE_REST_BASE_URL`: REST API base URL
//! - `STREAM_RECONNECT_BASE_MS` / `STREAM_RECONNECT_MAX_MS` / `STREAM_RECONNECT_JITTER`
//! - `STREAM_RESUBSCRIBE_DEBOUNCE_MS`: Topic change debounce (default: 300)
//! - `REST_MAX_ATTEMPTS` / `REST_RETRY_DELAY_MS` / `REST_TIMEOUT_SECS` / `REST_TOP_LIMIT`
//! - `REST_SEED_RETRY_MS`: Wait between top-volume seeding rounds (default: 5000)
//! - `MARKET_STREAM_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `RUST_LOG`: Extra log directives

use std::sync::Arc;
use std::time::Duration;

use market_stream::infrastructure::telemetry;
use market_stream::{
    AppConfig, BatchedTickerSink, ConnectionState, HealthServer, HealthServerState,
    IntervalFlushScheduler, KlineUpdate, RestConfig, RestSnapshotClient, SeedTarget,
    SnapshotSeeder, StreamClient, StreamClientConfig, StreamError, StreamKind, Ticker,
    TickerSnapshotPort, TickerStore, TungsteniteTransport, UpdateSink, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between status summaries in the log.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Fails only if a provider is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting market stream");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed");
    }

    let config = AppConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let store = Arc::new(TickerStore::new());
    let rest: Arc<dyn TickerSnapshotPort> = Arc::new(RestSnapshotClient::new(
        RestConfig::from_rest_settings(&config.rest),
    )?);
    let seeder = SnapshotSeeder::new(rest, Arc::clone(&store))
        .with_retry_interval(config.rest.seed_retry_interval);
    let target = SeedTarget::from_config(&config.stream.symbols, config.rest.top_limit);

    let sink = Arc::new(ServiceSink {
        tickers: BatchedTickerSink::new(Arc::clone(&store), IntervalFlushScheduler::default()),
    });

    let (client, manager) = StreamClient::spawn(
        StreamClientConfig::from_stream_settings(&config.stream),
        TungsteniteTransport::new(),
        sink,
        shutdown_token.clone(),
    );

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        client.clone(),
        Arc::clone(&store),
    ));
    health_state.expect_topics(target != SeedTarget::Top(0));
    let health_server = HealthServer::new(
        config.server.health_port,
        Arc::clone(&health_state),
        shutdown_token.clone(),
    );

    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tokio::spawn(seed_and_subscribe(
        seeder,
        target,
        client.clone(),
        health_state,
        shutdown_token.clone(),
    ));

    tokio::spawn(log_summaries(
        client.clone(),
        Arc::clone(&store),
        shutdown_token.clone(),
    ));

    tracing::info!("Market stream ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, manager).await.is_err() {
        tracing::warn!("Connection manager did not stop in time");
    }

    tracing::info!("Market stream stopped");
    Ok(())
}

/// Sink used by the service: batches tickers into the store and logs the rest.
struct ServiceSink {
    tickers: BatchedTickerSink<IntervalFlushScheduler>,
}

impl UpdateSink for ServiceSink {
    fn on_ticker(&self, ticker: Ticker) {
        self.tickers.push(ticker);
    }

    fn on_kline(&self, update: KlineUpdate) {
        tracing::debug!(
            symbol = %update.symbol,
            interval = %update.interval,
            closed = update.is_closed,
            close = update.kline.close,
            "Kline update"
        );
    }

    fn on_status_change(&self, state: ConnectionState) {
        tracing::info!(state = %state, "Stream connection state changed");
    }

    fn on_error(&self, error: &StreamError) {
        tracing::warn!(error = %error, "Stream error");
    }
}

/// Seed the store, then subscribe the ticker streams for the seeded or
/// configured symbols.
async fn seed_and_subscribe(
    seeder: SnapshotSeeder,
    target: SeedTarget,
    client: StreamClient,
    health: Arc<HealthServerState>,
    cancel: CancellationToken,
) {
    let Some(symbols) = seeder.symbols_to_stream(&target, &cancel).await else {
        tracing::info!("Seeding cancelled before any symbols were loaded");
        return;
    };

    if symbols.is_empty() {
        tracing::warn!("No symbols to stream; idling until shutdown");
        health.expect_topics(false);
        return;
    }

    match client.subscribe(&symbols, StreamKind::Ticker).await {
        Ok(()) => tracing::info!(symbols = symbols.len(), "Subscribed to ticker streams"),
        Err(e) => tracing::error!(error = %e, "Ticker subscription failed"),
    }
}

async fn log_summaries(client: StreamClient, store: Arc<TickerStore>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(SUMMARY_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match client.inspect().await {
                    Ok(snapshot) => tracing::info!(
                        state = %snapshot.state,
                        topics = snapshot.topics.len(),
                        reconnect_attempts = snapshot.reconnect_attempts,
                        tickers = store.len(),
                        "Stream summary"
                    ),
                    Err(_) => break,
                }
            }
        }
    }
}

fn log_config(config: &AppConfig) {
    tracing::info!(
        stream_url = %config.stream.base_url,
        rest_url = %config.rest.base_url,
        symbols = config.stream.symbols.len(),
        health_port = config.server.health_port,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}

/// Load `.env` from the working directory or the nearest ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}
