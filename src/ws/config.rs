#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Configuration for a [`ConnectionManager`](super::ConnectionManager).
///
/// ```
/// use std::time::Duration;
/// use preipo_client_sdk::ws::config::{Config, ReconnectConfig};
///
/// let config = Config::builder()
///     .endpoint("wss://realtime.example.com/ws")
///     .heartbeat_interval(Duration::from_secs(15))
///     .reconnect(ReconnectConfig::builder().max_attempts(3).build())
///     .build();
///
/// assert_eq!(config.reconnect.max_attempts, 3);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Address of the realtime endpoint
    #[builder(into)]
    pub endpoint: String,
    /// Interval for sending `ping` envelopes while the connection is open.
    /// [`Duration::ZERO`] disables the heartbeat.
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL_DURATION)]
    pub heartbeat_interval: Duration,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// Emit lifecycle and per-message debug logs
    #[builder(default)]
    pub debug: bool,
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive reconnection attempts before giving up.
    /// Zero disables automatic reconnection.
    #[builder(default = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    pub max_attempts: u32,
    /// Delay before the first reconnection attempt, doubled on every further attempt
    #[builder(default = DEFAULT_INITIAL_BACKOFF_DURATION)]
    pub initial_backoff: Duration,
    /// Upper bound for any single reconnection delay
    #[builder(default = DEFAULT_MAX_BACKOFF_DURATION)]
    pub max_backoff: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF_DURATION,
            max_backoff: DEFAULT_MAX_BACKOFF_DURATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::builder().endpoint("ws://localhost:8080").build();

        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_backoff, Duration::from_secs(30));
        assert!(!config.debug);
    }

    #[test]
    fn reconnect_builder_matches_default() {
        let built = ReconnectConfig::builder().build();
        let default = ReconnectConfig::default();

        assert_eq!(built.max_attempts, default.max_attempts);
        assert_eq!(built.initial_backoff, default.initial_backoff);
        assert_eq!(built.max_backoff, default.max_backoff);
    }
}
