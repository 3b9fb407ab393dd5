//! config.rs — Service configuration: TOML file + environment overrides.
//!
//! The file lives at `config/screener.toml` by default. A missing or
//! unparseable file falls back to defaults so local runs and tests do not
//! need a config checked out; the real deployment always ships one.

use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/screener.toml";
pub const ENV_CONFIG_PATH: &str = "SCREENER_CONFIG_PATH";
pub const ENV_POLL_INTERVAL_MS: &str = "SCREENER_POLL_INTERVAL_MS";
pub const ENV_ASSISTANT_API_KEY: &str = "ASSISTANT_API_KEY";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
/// Floor for the poll interval; anything lower would hammer the upstream.
const MIN_POLL_INTERVAL_MS: u64 = 250;

fn default_base_url() -> String {
    "https://api.vapi.ai".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_request_timeout_secs() -> u64 {
    20
}
fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Upstream voice-assistant API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub assistant_id: String,
    /// "ENV" means: read from ASSISTANT_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            assistant_id: String::new(),
            api_key: default_api_key(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Result polling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreenerConfig {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

impl ScreenerConfig {
    /// Load from SCREENER_CONFIG_PATH (or the default path), apply env
    /// overrides, and sanitize. Falls back to defaults on any read/parse
    /// failure.
    pub fn load() -> Self {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = match fs::read_to_string(&path) {
            Ok(raw) => Self::from_toml_str(&raw).unwrap_or_else(|e| {
                warn!(target: "config", path = %path.display(), error = %e, "config unparseable, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        cfg.apply_env();
        cfg.sanitize();
        cfg
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self) {
        if let Some(ms) = env::var(ENV_POLL_INTERVAL_MS)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            self.poll.interval_ms = ms;
        }
        // "ENV" indirection: never keep real keys in the config file.
        if self.assistant.api_key.trim().eq_ignore_ascii_case("env") {
            self.assistant.api_key = env::var(ENV_ASSISTANT_API_KEY).unwrap_or_default();
        }
    }

    fn sanitize(&mut self) {
        if self.poll.interval_ms < MIN_POLL_INTERVAL_MS {
            self.poll.interval_ms = MIN_POLL_INTERVAL_MS;
        }
        while self.assistant.base_url.ends_with('/') {
            self.assistant.base_url.pop();
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_are_usable() {
        let cfg = ScreenerConfig::default();
        assert_eq!(cfg.poll.interval_ms, 3000);
        assert_eq!(cfg.assistant.base_url, "https://api.vapi.ai");
        assert_eq!(cfg.assistant.api_key, "ENV");
    }

    #[test]
    fn toml_round_trip_with_partial_file() {
        let cfg = ScreenerConfig::from_toml_str(
            r#"
            [assistant]
            base_url = "https://assistant.example.com/"
            assistant_id = "asst_123"

            [poll]
            interval_ms = 1500
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.assistant.assistant_id, "asst_123");
        assert_eq!(cfg.poll.interval_ms, 1500);
        // Timeouts fall back to defaults when omitted.
        assert_eq!(cfg.assistant.connect_timeout_secs, 4);
    }

    #[test]
    #[serial]
    fn env_overrides_and_sanitization() {
        std::env::set_var(ENV_POLL_INTERVAL_MS, "50");
        std::env::set_var(ENV_ASSISTANT_API_KEY, "sk-test");
        let mut cfg = ScreenerConfig::from_toml_str(
            r#"
            [assistant]
            base_url = "https://assistant.example.com///"
            api_key = "ENV"
            "#,
        )
        .expect("parse");
        cfg.apply_env();
        cfg.sanitize();
        std::env::remove_var(ENV_POLL_INTERVAL_MS);
        std::env::remove_var(ENV_ASSISTANT_API_KEY);

        // 50ms is below the floor and gets clamped.
        assert_eq!(cfg.poll.interval_ms, 250);
        assert_eq!(cfg.assistant.api_key, "sk-test");
        assert_eq!(cfg.assistant.base_url, "https://assistant.example.com");
    }
}
