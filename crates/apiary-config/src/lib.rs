// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};

use anyhow::Result;
use apiary_domain::Filter;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

mod validate;

pub use validate::{expand_perfect_flac, validate, ConfigError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://apiary.db".to_string(),
            pool_max_size: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Where snatched .torrent files go.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DownloadsConfig {
    /// Default destination, watched by the BitTorrent client.
    pub watch_dir: Option<PathBuf>,
    /// Partial downloads land here before being moved; the system temp dir when unset.
    pub tmp_dir: Option<PathBuf>,
}

fn default_api_calls() -> usize {
    2
}

fn default_api_period_secs() -> u64 {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub name: String,
    pub url: String,
    pub user: String,
    pub password: String,
    /// Permits handed out per refill period.
    #[serde(default = "default_api_calls")]
    pub api_calls: usize,
    #[serde(default = "default_api_period_secs")]
    pub api_period_secs: u64,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosnatchConfig {
    pub tracker: String,
    pub irc_server: String,
    pub irc_key: String,
    pub nickserv_password: String,
    pub bot_name: String,
    pub announcer: String,
    pub announce_channel: String,
    #[serde(default)]
    pub blacklisted_uploaders: Vec<String>,
    /// Initial state of the autosnatch switch.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub trackers: Vec<TrackerConfig>,
    #[serde(default)]
    pub autosnatch: Vec<AutosnatchConfig>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl AppConfig {
    pub fn tracker(&self, name: &str) -> Option<&TrackerConfig> {
        self.trackers.iter().find(|t| t.name == name)
    }

    pub fn autosnatch_for(&self, tracker: &str) -> Option<&AutosnatchConfig> {
        self.autosnatch.iter().find(|a| a.tracker == tracker)
    }

    /// Filters that may be applied to releases from the given tracker, in configuration order.
    pub fn filters_for(&self, tracker: &str) -> Vec<Filter> {
        self.filters
            .iter()
            .filter(|f| f.applies_to_tracker(tracker))
            .cloned()
            .collect()
    }
}

/// Load configuration from defaults, optional TOML file, and environment overrides
/// (prefix: APIARY_), then validate it. Any validation failure is fatal.
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("APIARY_").split("__"));

    let mut config: AppConfig = figment.extract()?;
    validate(&mut config)?;
    Ok(config)
}
