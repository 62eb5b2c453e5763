//! Port Interfaces
//!
//! Defines the interfaces (ports) between the stream client and the
//! outside world, following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `UpdateSink`: Receives normalized records, status changes and errors
//! - `StreamTransport`: Opens the WebSocket connection for a stream URL
//! - `FlushScheduler`: Schedules a deferred flush of batched updates
//! - `TickerSnapshotPort`: One-shot REST snapshots of ticker statistics

mod scheduler;
mod sink;
mod snapshot;
mod transport;

pub use scheduler::{FlushScheduler, FlushTask};
pub use sink::{CallbackSink, NoopSink, StreamError, UpdateSink};
pub use snapshot::{SnapshotError, TickerSnapshotPort};
pub use transport::{StreamTransport, TransportEvent, TransportEventSender, TransportRequest};

#[cfg(test)]
pub use sink::MockUpdateSink;
#[cfg(test)]
pub use snapshot::MockTickerSnapshotPort;
