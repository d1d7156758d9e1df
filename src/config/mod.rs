//! Configuration loading and management
//!
//! A [`Config`] is built once at startup from, in increasing precedence:
//! built-in defaults, the TOML config file, `OJS_*` environment variables,
//! and explicit command-line overrides. After that it is never mutated; every
//! component receives it by reference.

mod io;
mod settings;

pub use io::{ConfigOverrides, DEFAULT_CONFIG};
pub use settings::{
    AuthSettings, FeatureFlags, JournalEntry, RefreshIntervals, RequestSettings, ServerSettings,
    StaleTimes, StatisticsSettings,
};

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the OJS installation, without the `/index.php/...` part
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// REST API version path segment
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Journal path used when nothing else is configured or discoverable
    #[serde(default = "default_context")]
    pub default_context: String,

    /// Preferred locale for titles and journal names
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub request: RequestSettings,

    #[serde(default)]
    pub refresh_intervals: RefreshIntervals,

    #[serde(default)]
    pub stale_times: StaleTimes,

    #[serde(default)]
    pub features: FeatureFlags,

    #[serde(default)]
    pub statistics: StatisticsSettings,

    #[serde(default)]
    pub server: ServerSettings,

    /// Manually configured journals. Leave empty to use the contexts endpoint.
    #[serde(default)]
    pub journals: Vec<JournalEntry>,
}

fn default_base_url() -> String {
    "http://localhost".to_string()
}

fn default_api_version() -> String {
    "api/v1".to_string()
}

fn default_context() -> String {
    "tjpsd".to_string()
}

fn default_locale() -> String {
    "en_US".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            default_context: default_context(),
            locale: default_locale(),
            auth: AuthSettings::default(),
            request: RequestSettings::default(),
            refresh_intervals: RefreshIntervals::default(),
            stale_times: StaleTimes::default(),
            features: FeatureFlags::default(),
            statistics: StatisticsSettings::default(),
            server: ServerSettings::default(),
            journals: Vec::new(),
        }
    }
}

impl Config {
    /// URL of a journal-level API endpoint, e.g. `api_url("tjpsd", "/stats/editorial")`
    pub fn api_url(&self, context: &str, endpoint: &str) -> String {
        format!(
            "{}/index.php/{}/{}{}",
            self.base_url.trim_end_matches('/'),
            context,
            self.api_version.trim_matches('/'),
            endpoint
        )
    }

    /// URL of the site-level contexts endpoint
    pub fn contexts_url(&self) -> String {
        self.api_url("index", "/contexts")
    }

    /// Public URL of a journal
    pub fn context_url(&self, context: &str) -> String {
        format!("{}/index.php/{}", self.base_url.trim_end_matches('/'), context)
    }

    /// The bearer token, if one is configured
    pub fn api_token(&self) -> Option<&str> {
        Some(self.auth.api_key.as_str()).filter(|t| !t.trim().is_empty())
    }

    pub fn is_auth_configured(&self) -> bool {
        self.api_token().is_some()
    }
}
