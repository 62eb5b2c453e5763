//! Domain Layer - Core streaming types and subscription state.
//!
//! This layer contains the topic model, the desired-subscription set and the
//! canonical market data records. Nothing here touches the network.

/// Market data records and connection state.
pub mod streaming;

/// Desired-subscription tracking.
pub mod subscription;

/// Topic derivation and stream kind classification.
pub mod topic;
