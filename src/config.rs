// Layered settings: built-in defaults < config file < QUAKE_RELAY__* env vars.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::feeds::FeedIdentity;

pub const DEFAULT_PRIMARY_URL: &str = "wss://ws-api.wolfx.jp/jma_eew";
pub const DEFAULT_SECONDARY_URL: &str = "https://api.p2pquake.net/v2/ws";
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

const DEFAULT_CONFIG_NAME: &str = "quake-relay";
const ENV_PREFIX: &str = "QUAKE_RELAY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub feeds: FeedSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub primary_url: String,
    pub secondary_url: String,
    // fixed delay, not a backoff base
    pub reconnect_delay_secs: u64,
    pub enabled: Vec<FeedIdentity>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            primary_url: DEFAULT_PRIMARY_URL.to_string(),
            secondary_url: DEFAULT_SECONDARY_URL.to_string(),
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            enabled: FeedIdentity::ALL.to_vec(),
        }
    }
}

impl FeedSettings {
    pub fn endpoint(&self, feed: FeedIdentity) -> &str {
        match feed {
            FeedIdentity::PrimaryEew => &self.primary_url,
            FeedIdentity::SecondaryQuake => &self.secondary_url,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub log_filter: String,
    pub metrics_port: u16, // only used with the metrics-exporter feature
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self { log_filter: "info".to_string(), metrics_port: 9000 }
    }
}

impl Settings {
    /// `path` must exist when given; otherwise `./quake-relay.{toml,yaml,json}` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }
}
