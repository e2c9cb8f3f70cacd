//! Session configuration.
//!
//! All fields have sensible defaults so a partial YAML document deserializes.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::ChannelId;
use crate::session::ReconnectPolicy;

/// Where the bot returns to when it is left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelTarget {
    /// A numeric channel id.
    Id(ChannelId),
    /// A channel path such as `/Music/`, resolved through the transport.
    Path(String),
}

impl Default for ChannelTarget {
    fn default() -> Self {
        Self::Path("/".to_string())
    }
}

/// Configuration for pluggable event handlers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventHandlingConfig {
    /// Dispatch events to the handler set after internal processing.
    pub load_event_handlers: bool,
    /// Handler manifest file, or a directory containing `handlers.yaml`.
    pub event_handlers_path: Option<PathBuf>,
}

/// Configuration for background queue prefetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub enabled: bool,
    /// Service name stamped on fetched tracks.
    pub service: String,
    /// Continuation endpoint, queried as `{endpoint}?videoId=..&limit=..`.
    pub endpoint: Option<String>,
    /// Maximum number of entries requested per fetch.
    pub limit: usize,
    /// Maximum concurrent fetches (`0` = unbounded).
    pub max_in_flight: usize,
    /// HTTP request timeout (seconds).
    pub timeout_secs: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service: "ytm".to_string(),
            endpoint: None,
            limit: 50,
            max_in_flight: 0,
            timeout_secs: 10,
        }
    }
}

/// Configuration for one bot session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Username the bot logs in with. Used to recognise its own uploads.
    pub username: String,
    /// Channel to return to when the bot is left alone.
    pub default_channel: ChannelTarget,
    /// Status text re-applied after every successful join.
    pub status_text: String,

    // Reconnection
    /// Retries per lifecycle stage before giving up (negative = unbounded).
    pub reconnection_attempts: i32,
    /// Fixed delay before each retry (seconds).
    pub reconnection_timeout_secs: u64,
    /// Allow bounded retries before the first successful join.
    pub reconnect_on_startup: bool,

    /// Upper bound on a single transport poll (milliseconds).
    pub poll_timeout_ms: u64,

    pub event_handling: EventHandlingConfig,
    pub recommendations: RecommendationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            default_channel: ChannelTarget::default(),
            status_text: String::new(),
            reconnection_attempts: -1,
            reconnection_timeout_secs: 10,
            reconnect_on_startup: true,
            poll_timeout_ms: 500,
            event_handling: EventHandlingConfig::default(),
            recommendations: RecommendationConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Builds the reconnect policy described by this configuration.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.reconnection_attempts,
            Duration::from_secs(self.reconnection_timeout_secs),
        )
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_timeout_ms == 0 {
            return Err("poll_timeout_ms must be >= 1".to_string());
        }
        if self.event_handling.load_event_handlers && self.event_handling.event_handlers_path.is_none()
        {
            return Err(
                "event_handling.event_handlers_path is required when load_event_handlers is set"
                    .to_string(),
            );
        }
        if self.recommendations.enabled {
            if self.recommendations.endpoint.is_none() {
                return Err("recommendations.endpoint is required when enabled".to_string());
            }
            if self.recommendations.limit == 0 {
                return Err("recommendations.limit must be >= 1".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_unbounded() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.reconnect_policy().is_unbounded());
    }

    #[test]
    fn channel_target_accepts_id_or_path() {
        let config: SessionConfig = serde_yaml::from_str("default_channel: 4").unwrap();
        assert_eq!(config.default_channel, ChannelTarget::Id(4));

        let config: SessionConfig = serde_yaml::from_str("default_channel: /Music/").unwrap();
        assert_eq!(
            config.default_channel,
            ChannelTarget::Path("/Music/".to_string())
        );
    }

    #[test]
    fn handlers_require_a_path() {
        let mut config = SessionConfig::default();
        config.event_handling.load_event_handlers = true;
        assert!(config.validate().is_err());

        config.event_handling.event_handlers_path = Some(PathBuf::from("handlers.yaml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn enabled_recommendations_require_endpoint() {
        let mut config = SessionConfig::default();
        config.recommendations.enabled = true;
        assert!(config.validate().is_err());
    }
}
