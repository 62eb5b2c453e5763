//! REST Snapshot Integration Tests
//!
//! Runs the snapshot client against a mock HTTP server: retry behavior,
//! rate limiting, top-ticker selection, kline decoding and skipping of
//! malformed records.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::{Duration, Instant};

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use market_stream::{
    KlineQuery, RestConfig, RestError, RestSnapshotClient, SnapshotError, TickerSnapshotPort,
};

fn client_for(server: &MockServer, max_attempts: u32) -> RestSnapshotClient {
    RestSnapshotClient::new(RestConfig {
        base_url: server.uri(),
        max_attempts,
        retry_delay: Duration::from_millis(20),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn ticker_json(symbol: &str, last_price: &str, volume: &str) -> Value {
    json!({
        "symbol": symbol,
        "lastPrice": last_price,
        "priceChange": "1.0",
        "priceChangePercent": "0.5",
        "volume": volume,
        "highPrice": "110.0",
        "lowPrice": "90.0"
    })
}

// =============================================================================
// Retry Behavior
// =============================================================================

#[tokio::test]
async fn test_rate_limit_honors_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let started = Instant::now();
    let body = client
        .fetch_with_retry(&format!("{}/ping", server.uri()), &[])
        .await
        .unwrap();

    assert_eq!(body, "{}");
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_rate_limit_without_header_uses_retry_delay() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let started = Instant::now();
    let body = client
        .fetch_with_retry(&format!("{}/ping", server.uri()), &[])
        .await
        .unwrap();

    assert_eq!(body, "ok");
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(20));
    assert!(elapsed < Duration::from_secs(1));
}

#[tokio::test]
async fn test_server_error_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let body = client
        .fetch_with_retry(&format!("{}/ping", server.uri()), &[])
        .await
        .unwrap();

    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_retries_exhausted_reports_last_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let started = Instant::now();
    let err = client
        .fetch_with_retry(&format!("{}/ping", server.uri()), &[])
        .await
        .unwrap_err();

    match err {
        RestError::RetriesExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("500"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Two waits between three attempts, none after the last
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(40));
    assert!(elapsed < Duration::from_secs(1));
}

#[tokio::test]
async fn test_single_attempt_does_not_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let started = Instant::now();
    let err = client
        .fetch_with_retry(&format!("{}/ping", server.uri()), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, RestError::RetriesExhausted { attempts: 1, .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

// =============================================================================
// Tickers
// =============================================================================

#[tokio::test]
async fn test_top_tickers_filters_sorts_and_limits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ticker/24hr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            ticker_json("BTCUSDT", "50000.0", "900"),
            ticker_json("ETHBTC", "0.05", "99999"),
            ticker_json("ETHUSDT", "3000.0", "5000"),
            ticker_json("SOLUSDT", "150.0", "2500"),
            ticker_json("DOGEUSDT", "0.1", "100"),
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let tickers = client.top_tickers(3).await.unwrap();

    let symbols: Vec<&str> = tickers.iter().map(|t| t.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["ETHUSDT", "SOLUSDT", "BTCUSDT"]);
    assert!((tickers[0].price - 3000.0).abs() < f64::EPSILON);
    assert!(tickers[0].last_update_time > 0);
}

#[tokio::test]
async fn test_tickers_for_symbols_sends_json_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ticker/24hr"))
        .and(query_param("symbols", r#"["BTCUSDT","ETHUSDT"]"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            ticker_json("BTCUSDT", "50000.0", "900"),
            ticker_json("ETHUSDT", "", "5000"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let tickers = client
        .tickers(&["BTCUSDT".to_string(), "ETHUSDT".to_string()])
        .await
        .unwrap();

    assert_eq!(tickers.len(), 2);
    // No lastPrice and no price: zero
    assert!(tickers[1].price.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_top_tickers_skip_malformed_record() {
    let server = MockServer::start().await;
    let mut old = ticker_json("OLDUSDT", "1.0", "99999");
    old["priceChange"] = json!("");
    Mock::given(method("GET"))
        .and(path("/ticker/24hr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            ticker_json("BTCUSDT", "50000.0", "900"),
            old,
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let tickers = client.fetch_top_tickers(100).await.unwrap();

    let symbols: Vec<&str> = tickers.iter().map(|t| t.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTCUSDT"]);
}

#[tokio::test]
async fn test_malformed_records_do_not_take_limit_slots() {
    let server = MockServer::start().await;
    let mut broken = ticker_json("BADUSDT", "1.0", "99999");
    broken["highPrice"] = json!("n/a");
    Mock::given(method("GET"))
        .and(path("/ticker/24hr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            broken,
            ticker_json("ETHUSDT", "3000.0", "5000"),
            ticker_json("SOLUSDT", "150.0", "2500"),
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let tickers = client.top_tickers(2).await.unwrap();

    let symbols: Vec<&str> = tickers.iter().map(|t| t.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["ETHUSDT", "SOLUSDT"]);
}

#[tokio::test]
async fn test_snapshot_port_reports_unavailable_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ticker/24hr"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, 2);
    let err = client.top_tickers(10).await.unwrap_err();

    assert!(matches!(err, SnapshotError::Unavailable { attempts: 2, .. }));
}

#[tokio::test]
async fn test_tickers_for_no_symbols_skips_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    assert!(client.fetch_tickers(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unexpected_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ticker/24hr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": -1121})))
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let err = client.fetch_top_tickers(10).await.unwrap_err();
    assert!(matches!(err, RestError::Decode(_)));
}

// =============================================================================
// Klines
// =============================================================================

#[tokio::test]
async fn test_klines_decode_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/klines"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("interval", "1m"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [60000, "100.0", "110.0", "95.0", "105.0", "12.5", 119_999, "1300.0", 42],
            [120_000, "105.0", "106.0", "101.0", "102.0", "3.0", 179_999, "306.0", 7],
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let klines = client
        .fetch_klines(&KlineQuery::new("BTCUSDT").with_limit(2))
        .await
        .unwrap();

    assert_eq!(klines.len(), 2);
    assert_eq!(klines[0].open_time, 60_000);
    assert_eq!(klines[0].close_time, 119_999);
    assert!((klines[0].close - 105.0).abs() < f64::EPSILON);
    assert!((klines[1].volume - 3.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_malformed_kline_rows_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [60000, "100.0", "110.0"],
            [120_000, "105.0", "106.0", "101.0", "102.0", "3.0", 179_999, "306.0", 7],
            [180_000, "x", "106.0", "101.0", "102.0", "3.0", 239_999, "306.0", 7],
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let klines = client
        .fetch_klines(&KlineQuery::new("BTCUSDT"))
        .await
        .unwrap();

    assert_eq!(klines.len(), 1);
    assert_eq!(klines[0].open_time, 120_000);
}
