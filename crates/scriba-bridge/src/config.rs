//! Bridge configuration
//!
//! All knobs recognized by the bridge live here. The struct is plain serde
//! data so a host application can embed it in its own configuration file;
//! durations accept humantime strings ("30m", "1s") on the wire.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the agent-to-UI bridge
///
/// # Example
/// ```
/// use scriba_bridge::config::BridgeConfig;
/// use std::time::Duration;
///
/// let config = BridgeConfig::default()
///     .with_max_retries(5)
///     .with_retry_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// When false, every bridge emission is a no-op returning false
    #[serde(default = "default_true")]
    pub enable_ui_bridge: bool,

    /// Ceiling for serialized action/result payloads, in bytes
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,

    /// Maximum number of retries after the first tool invocation attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff
    #[serde(with = "humantime_serde", default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Idle-session expiry threshold
    #[serde(with = "humantime_serde", default = "default_session_timeout")]
    pub session_timeout: Duration,

    /// Period of the idle-session sweeper
    #[serde(with = "humantime_serde", default = "default_sweep_interval")]
    pub sweep_interval: Duration,

    /// Bounded wait applied around best-effort UI notifications
    #[serde(with = "humantime_serde", default = "default_notify_timeout")]
    pub notify_timeout: Duration,

    /// Toggle metric accumulation; never part of correctness
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Toggle diagnostic (warn-level) logging of drops and unknown sessions
    #[serde(default = "default_true")]
    pub enable_logging: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_payload_size() -> usize {
    1024 * 1024
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_notify_timeout() -> Duration {
    Duration::from_secs(3)
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enable_ui_bridge: true,
            max_payload_size: default_max_payload_size(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            session_timeout: default_session_timeout(),
            sweep_interval: default_sweep_interval(),
            notify_timeout: default_notify_timeout(),
            enable_metrics: true,
            enable_logging: true,
        }
    }
}

impl BridgeConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the bridge entirely
    pub fn with_ui_bridge_enabled(mut self, enabled: bool) -> Self {
        self.enable_ui_bridge = enabled;
        self
    }

    /// Set the serialized payload ceiling in bytes
    pub fn with_max_payload_size(mut self, bytes: usize) -> Self {
        self.max_payload_size = bytes;
        self
    }

    /// Set the retry budget for tool invocations
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base backoff delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the idle-session expiry threshold
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the sweeper period
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the bounded wait for UI notifications
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Enable or disable metric accumulation
    pub fn with_metrics_enabled(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Enable or disable diagnostic logging
    pub fn with_logging_enabled(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = BridgeConfig::default();
        assert!(config.enable_ui_bridge);
        assert_eq!(config.max_payload_size, 1_048_576);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(1000));
        assert_eq!(config.session_timeout, Duration::from_secs(1800));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_builder_methods() {
        let config = BridgeConfig::new()
            .with_max_retries(2)
            .with_retry_delay(Duration::from_millis(10))
            .with_session_timeout(Duration::ZERO);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert_eq!(config.session_timeout, Duration::ZERO);
    }

    #[test]
    fn test_deserialize_with_humantime_durations() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{
                "session_timeout": "30m",
                "retry_delay": "250ms",
                "max_retries": 4
            }"#,
        )
        .unwrap();
        assert_eq!(config.session_timeout, Duration::from_secs(1800));
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.max_retries, 4);
        // Unspecified fields fall back to defaults
        assert!(config.enable_ui_bridge);
        assert_eq!(config.max_payload_size, 1_048_576);
    }
}
