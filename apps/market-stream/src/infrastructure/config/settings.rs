//! Market Stream Configuration Settings
//!
//! Configuration types for the stream client, the REST snapshot client and
//! the health server, loaded from environment variables.
//!
//! Unset variables fall back to the `Default` values. A variable that is set
//! but malformed is an error, so typos surface at startup.

use std::time::Duration;

use crate::infrastructure::binance::client::{DEFAULT_RESUBSCRIBE_DEBOUNCE, DEFAULT_STREAM_URL};
use crate::infrastructure::binance::rest::DEFAULT_REST_URL;

/// Stream connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// Combined stream endpoint.
    pub base_url: String,
    /// Reconnect delay for the first attempt.
    pub reconnect_delay_base: Duration,
    /// Cap on the reconnect delay before jitter.
    pub reconnect_delay_max: Duration,
    /// Reconnect jitter as a fraction of the delay.
    pub reconnect_jitter: f64,
    /// Quiet period before reopening after a topic change.
    pub resubscribe_debounce: Duration,
    /// Symbols to stream; empty means the REST top list.
    pub symbols: Vec<String>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STREAM_URL.to_string(),
            reconnect_delay_base: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_jitter: 0.2,
            resubscribe_debounce: DEFAULT_RESUBSCRIBE_DEBOUNCE,
            symbols: Vec::new(),
        }
    }
}

/// REST snapshot settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestSettings {
    /// API base URL.
    pub base_url: String,
    /// Total attempts per request.
    pub max_attempts: u32,
    /// Wait between attempts.
    pub retry_delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Size of the top-volume list used to seed the store.
    pub top_limit: usize,
    /// Wait between seeding rounds while the top-volume list is unavailable.
    pub seed_retry_interval: Duration,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REST_URL.to_string(),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            top_limit: 100,
            seed_retry_interval: Duration::from_secs(5),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// Stream connection settings.
    pub stream: StreamSettings,
    /// REST snapshot settings.
    pub rest: RestSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a malformed value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a key maps to a malformed value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let stream_defaults = StreamSettings::default();
        let rest_defaults = RestSettings::default();

        let stream = StreamSettings {
            base_url: env.string("BINANCE_WS_BASE_URL", &stream_defaults.base_url),
            reconnect_delay_base: env.millis(
                "STREAM_RECONNECT_BASE_MS",
                stream_defaults.reconnect_delay_base,
            )?,
            reconnect_delay_max: env
                .millis("STREAM_RECONNECT_MAX_MS", stream_defaults.reconnect_delay_max)?,
            reconnect_jitter: env.parse("STREAM_RECONNECT_JITTER", stream_defaults.reconnect_jitter)?,
            resubscribe_debounce: env.millis(
                "STREAM_RESUBSCRIBE_DEBOUNCE_MS",
                stream_defaults.resubscribe_debounce,
            )?,
            symbols: env.list("STREAM_SYMBOLS"),
        };

        if !(0.0..=1.0).contains(&stream.reconnect_jitter) {
            return Err(ConfigError::InvalidValue {
                key: "STREAM_RECONNECT_JITTER".to_string(),
                value: stream.reconnect_jitter.to_string(),
            });
        }

        let rest = RestSettings {
            base_url: env.string("BINANCE_REST_BASE_URL", &rest_defaults.base_url),
            max_attempts: env.parse("REST_MAX_ATTEMPTS", rest_defaults.max_attempts)?,
            retry_delay: env.millis("REST_RETRY_DELAY_MS", rest_defaults.retry_delay)?,
            timeout: env
                .parse("REST_TIMEOUT_SECS", rest_defaults.timeout.as_secs())
                .map(Duration::from_secs)?,
            top_limit: env.parse("REST_TOP_LIMIT", rest_defaults.top_limit)?,
            seed_retry_interval: env
                .millis("REST_SEED_RETRY_MS", rest_defaults.seed_retry_interval)?,
        };

        let server = ServerSettings {
            health_port: env.parse(
                "MARKET_STREAM_HEALTH_PORT",
                ServerSettings::default().health_port,
            )?,
        };

        Ok(Self {
            stream,
            rest,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable is set but cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set, non-blank value of `key`.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        self.get(key).map_or(Ok(default), |value| {
            value.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            })
        })
    }

    fn millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.get(key).map_or(Ok(default), |value| {
            value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                })
        })
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn stream_settings_defaults() {
        let settings = StreamSettings::default();
        assert_eq!(settings.base_url, "wss://stream.binance.com:9443/stream");
        assert_eq!(settings.reconnect_delay_base, Duration::from_millis(1000));
        assert_eq!(settings.reconnect_delay_max, Duration::from_millis(30000));
        assert_eq!(settings.resubscribe_debounce, Duration::from_millis(300));
        assert!((settings.reconnect_jitter - 0.2).abs() < f64::EPSILON);
        assert!(settings.symbols.is_empty());
    }

    #[test]
    fn rest_and_server_defaults() {
        let rest = RestSettings::default();
        assert_eq!(rest.base_url, "https://api.binance.com/api/v3");
        assert_eq!(rest.max_attempts, 3);
        assert_eq!(rest.top_limit, 100);
        assert_eq!(rest.seed_retry_interval, Duration::from_secs(5));
        assert_eq!(ServerSettings::default().health_port, 8083);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("BINANCE_WS_BASE_URL", "wss://testnet.example/stream"),
            ("STREAM_RECONNECT_BASE_MS", "250"),
            ("STREAM_RESUBSCRIBE_DEBOUNCE_MS", "50"),
            ("STREAM_SYMBOLS", "btcusdt, ETHUSDT,,"),
            ("REST_MAX_ATTEMPTS", "5"),
            ("REST_TIMEOUT_SECS", "3"),
            ("MARKET_STREAM_HEALTH_PORT", "9000"),
        ])
        .unwrap();

        assert_eq!(config.stream.base_url, "wss://testnet.example/stream");
        assert_eq!(config.stream.reconnect_delay_base, Duration::from_millis(250));
        assert_eq!(config.stream.resubscribe_debounce, Duration::from_millis(50));
        assert_eq!(config.stream.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.rest.max_attempts, 5);
        assert_eq!(config.rest.timeout, Duration::from_secs(3));
        assert_eq!(config.server.health_port, 9000);
    }

    #[test]
    fn blank_value_falls_back_to_default() {
        let config = config_from(&[("REST_MAX_ATTEMPTS", "  ")]).unwrap();
        assert_eq!(config.rest.max_attempts, 3);
    }

    #[test]
    fn malformed_number_is_error() {
        let err = config_from(&[("STREAM_RECONNECT_MAX_MS", "30s")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "STREAM_RECONNECT_MAX_MS".to_string(),
                value: "30s".to_string(),
            }
        );
    }

    #[test]
    fn jitter_out_of_range_is_error() {
        let err = config_from(&[("STREAM_RECONNECT_JITTER", "1.5")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "STREAM_RECONNECT_JITTER"));
    }
}
