//! Configuration loading from TOML with environment overrides.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults so a partial (or missing) file still yields
//! a usable configuration. `AVIATOR_SERVER_URL` overrides the server URL.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Env var that overrides `server.base_url`.
pub const SERVER_URL_ENV: &str = "AVIATOR_SERVER_URL";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub poll: PollConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    /// Per-request timeout. Must stay below the poll period.
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5050".to_string(),
            request_timeout_ms: 80,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Join automatically on startup when set.
    pub player_name: Option<String>,
    pub default_bet: Decimal,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            player_name: None,
            default_bet: dec!(100),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollConfig {
    pub period_ms: u64,
    /// How often active bets and crash history are refreshed.
    pub aux_refresh_ms: u64,
    pub crash_history_len: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            period_ms: 100,
            aux_refresh_ms: 2_000,
            crash_history_len: 10,
        }
    }
}

impl PollConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn aux_refresh(&self) -> Duration {
        Duration::from_millis(self.aux_refresh_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8090,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    /// Applies env overrides and validates either way.
    pub fn load_or_default(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            config.server.base_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Reject settings that would let requests pile up behind the poll loop.
    pub fn validate(&self) -> Result<()> {
        if self.poll.period_ms == 0 {
            bail!("poll.period_ms must be positive");
        }
        if self.server.request_timeout_ms == 0
            || self.server.request_timeout_ms >= self.poll.period_ms
        {
            bail!(
                "server.request_timeout_ms ({}) must be positive and below poll.period_ms ({})",
                self.server.request_timeout_ms,
                self.poll.period_ms
            );
        }
        if self.poll.crash_history_len == 0 {
            bail!("poll.crash_history_len must be positive");
        }
        if self.session.default_bet <= Decimal::ZERO {
            bail!("session.default_bet must be positive");
        }
        Ok(())
    }
}
