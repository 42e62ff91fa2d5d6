use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use snafu::ResultExt as _;

use crate::database::DatabaseConfig;
use crate::error::{ApplicationError, ConfigLoadSnafu};
use crate::store::StoreConfig;

/// Everything the service reads from the environment, one prefix per section.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store: StoreSettings,
    pub trending: TrendingConfig,
    pub retention: RetentionConfig,
}

pub fn load() -> Result<Config, ApplicationError> {
    Ok(Config {
        server: envy::from_env().context(ConfigLoadSnafu { section: "server" })?,
        database: envy::prefixed("SURREAL_")
            .from_env()
            .context(ConfigLoadSnafu { section: "SURREAL_" })?,
        store: envy::prefixed("STORE_")
            .from_env()
            .context(ConfigLoadSnafu { section: "STORE_" })?,
        trending: envy::prefixed("TRENDING_")
            .from_env()
            .context(ConfigLoadSnafu { section: "TRENDING_" })?,
        retention: envy::prefixed("RETENTION_")
            .from_env()
            .context(ConfigLoadSnafu { section: "RETENTION_" })?,
    })
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// `RUST_LOG` directives, `info` when unset.
    #[serde(rename = "rust_log", default)]
    pub log_filter: Option<String>,
    /// Views that may wait for the background writer before new ones are dropped.
    #[serde(default = "default_recorder_capacity")]
    pub recorder_capacity: usize,
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_recorder_capacity() -> usize {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    #[serde(default = "default_query_timeout", deserialize_with = "humantime_duration::required")]
    pub query_timeout: Duration,
    #[serde(default = "default_max_recent")]
    pub max_recent: usize,
}

impl StoreSettings {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            query_timeout: self.query_timeout,
            max_recent: self.max_recent,
            ..StoreConfig::default()
        }
    }
}

fn default_query_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_max_recent() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendingConfig {
    #[serde(default = "default_window", deserialize_with = "humantime_duration::required")]
    pub window: Duration,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_window() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    100
}

/// Events are kept forever unless a horizon is set.
#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    #[serde(default, deserialize_with = "humantime_duration::optional")]
    pub horizon: Option<Duration>,
    #[serde(default = "default_every", deserialize_with = "humantime_duration::required")]
    pub every: Duration,
}

fn default_every() -> Duration {
    Duration::from_secs(60 * 60)
}

/// Durations written the human way, `2s`, `90m`, `30days`.
pub mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn parse(text: &str) -> Result<Duration, humantime::DurationError> {
        humantime::parse_duration(text.trim())
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(serde::de::Error::custom)
    }

    pub fn optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        parse(&text).map(Some).map_err(serde::de::Error::custom)
    }
}
