//! Binance Adapters
//!
//! Implements the stream client and REST snapshot client for Binance spot
//! market data:
//!
//! - **Stream**: Combined stream endpoint, one socket for every topic (JSON)
//! - **REST**: 24h ticker and kline snapshots with bounded retry (JSON)

pub mod backoff;
pub mod client;
pub mod codec;
pub mod messages;
pub mod normalize;
pub mod rest;
pub mod transport;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use client::{
    ClientError, ManagerSnapshot, StreamClient, StreamClientConfig, build_stream_url,
};
pub use codec::{CodecError, StreamCodec, StreamFrame};
pub use rest::{KlineQuery, RestConfig, RestError, RestSnapshotClient};
pub use transport::{TransportError, TungsteniteTransport};
