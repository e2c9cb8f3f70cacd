//! Runner configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use talkbot_core::events::{ChannelId, UserId};
use talkbot_core::SessionConfig;

/// Settings for the scripted replay transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// JSON Lines file of raw events to replay after the handshake.
    /// Override: `TALKBOT_SCRIPT`
    pub script: Option<PathBuf>,

    /// User id assigned to the bot on login.
    pub user_id: UserId,

    /// Channel the bot joins.
    pub join_channel: ChannelId,

    /// Known channel paths, e.g. `/Music/: 4`.
    pub channels: HashMap<String, ChannelId>,

    /// Stop once the script has been replayed.
    pub exit_when_drained: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            script: None,
            user_id: 1,
            join_channel: 1,
            channels: HashMap::new(),
            exit_when_drained: true,
        }
    }
}

/// Runner configuration loaded from YAML with environment overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Session settings handed to talkbot-core.
    pub session: SessionConfig,

    pub replay: ReplayConfig,
}

impl AppConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("TALKBOT_USERNAME") {
            self.session.username = val;
        }

        if let Some(val) = var("TALKBOT_RECONNECTION_ATTEMPTS") {
            if let Ok(attempts) = val.parse() {
                self.session.reconnection_attempts = attempts;
            }
        }

        if let Some(val) = var("TALKBOT_HANDLERS_PATH") {
            self.session.event_handling.load_event_handlers = true;
            self.session.event_handling.event_handlers_path = Some(PathBuf::from(val));
        }

        // Note: TALKBOT_SCRIPT and TALKBOT_LOG_LEVEL are handled by clap in main.rs
    }
}
