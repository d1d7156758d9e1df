//! Settings sections of the configuration file

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// API authentication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    /// JWT API key generated from the OJS user profile ("API Key" tab).
    /// Sent as `Authorization: Bearer <key>`. Empty disables the header.
    #[serde(default)]
    pub api_key: String,
}

/// HTTP request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSettings {
    /// Default timeout for every API call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Timeout for the publication statistics call, the heaviest endpoint
    #[serde(default = "default_publication_timeout_ms")]
    pub publication_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_publication_timeout_ms() -> u64 {
    15_000
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            publication_timeout_ms: default_publication_timeout_ms(),
        }
    }
}

impl RequestSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn publication_timeout(&self) -> Duration {
        Duration::from_millis(self.publication_timeout_ms)
    }
}

/// Background poll intervals (only used while `features.auto_refresh` is on)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshIntervals {
    #[serde(default = "five_minutes_ms")]
    pub dashboard_metrics_ms: u64,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self {
            dashboard_metrics_ms: five_minutes_ms(),
        }
    }
}

/// How long a cached snapshot counts as fresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleTimes {
    #[serde(default = "five_minutes_ms")]
    pub dashboard_metrics_ms: u64,

    #[serde(default = "thirty_minutes_ms")]
    pub contexts_ms: u64,
}

impl Default for StaleTimes {
    fn default() -> Self {
        Self {
            dashboard_metrics_ms: five_minutes_ms(),
            contexts_ms: thirty_minutes_ms(),
        }
    }
}

fn five_minutes_ms() -> u64 {
    5 * 60 * 1000
}

fn thirty_minutes_ms() -> u64 {
    30 * 60 * 1000
}

/// Feature flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Re-fetch dashboard metrics in the background every
    /// `refresh_intervals.dashboard_metrics_ms`
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,

    /// Raise the default log level to debug
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_auto_refresh() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            auto_refresh: default_auto_refresh(),
            debug_mode: false,
        }
    }
}

/// Statistics query window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsSettings {
    /// Lookback window for the view timelines
    #[serde(default = "default_timeline_days")]
    pub timeline_days: u32,
}

fn default_timeline_days() -> u32 {
    365
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            timeline_days: default_timeline_days(),
        }
    }
}

/// Local snapshot server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8787
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// A statically configured journal (used when the contexts endpoint is restricted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub url_path: String,
    pub name: String,
}
