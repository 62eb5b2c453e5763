//! Application Layer - Port definitions and consumer-side services.
//!
//! Ports describe how the stream client talks to the socket, the consumer,
//! the REST snapshot source and the render scheduler. Services are the
//! consumer-side building blocks that sit behind the update sink.

/// Port interfaces for external systems (socket, sink, scheduler, REST).
pub mod ports;

/// Ticker repository and batched update sink.
pub mod services;
