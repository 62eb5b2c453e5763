//! Configuration Module
//!
//! Environment-driven configuration for the stream client, REST client and
//! health server.

mod settings;

pub use settings::{AppConfig, ConfigError, RestSettings, ServerSettings, StreamSettings};
