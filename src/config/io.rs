//! Configuration file I/O and override layering

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::Config;

/// Default configuration content for `ojs-metrics init`
pub const DEFAULT_CONFIG: &str = r#"# ojs-metrics configuration
# ========================
#
# Values here can be overridden by environment variables
# (OJS_BASE_URL, OJS_CONTEXT, OJS_API_KEY, OJS_AUTO_REFRESH)
# and by the --base-url / --context / --token flags.

# Base URL of your OJS installation (without /index.php/...)
base_url = "http://localhost"

# REST API version path
api_version = "api/v1"

# Journal path used when no journals are configured and the
# site-level contexts endpoint is not reachable
default_context = "tjpsd"

# Preferred locale for publication titles and journal names
locale = "en_US"

[auth]
# JWT API key (OJS: User Profile -> API Key).
# The server's config.inc.php must have api_key_secret set.
api_key = ""

[request]
timeout_ms = 10000
# The publication statistics endpoint is the slowest one
publication_timeout_ms = 15000

[refresh_intervals]
dashboard_metrics_ms = 300000

[stale_times]
dashboard_metrics_ms = 300000
contexts_ms = 1800000

[features]
auto_refresh = true
debug_mode = false

[statistics]
# Lookback window for the abstract/galley view timelines
timeline_days = 365

[server]
port = 8787

# Manually configured journals (the contexts endpoint usually requires
# site admin rights). Leave empty to discover journals from the API.
#
# [[journals]]
# url_path = "tjpsd"
# name = "TJPSD"
"#;

/// Explicit overrides, highest precedence (typically CLI flags)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub context: Option<String>,
    pub token: Option<String>,
}

impl Config {
    /// Get the global config directory path (~/.ojs-metrics/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ojs-metrics")
    }

    /// Get the global config file path (~/.ojs-metrics/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the file layer.
    ///
    /// An explicit path must exist. Without one, the global config is used
    /// when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let global_path = Self::global_config_path();
                if global_path.exists() {
                    Self::from_file(&global_path)
                } else {
                    tracing::debug!(
                        "No config at {}, using defaults",
                        global_path.display()
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    /// Build the effective configuration: file, then environment, then overrides
    pub fn resolve(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        Ok(Self::load(path)?
            .with_env_from(|key| std::env::var(key).ok())
            .with_overrides(overrides))
    }

    /// Apply `OJS_*` environment variables using the given lookup
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = non_empty("OJS_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(context) = non_empty("OJS_CONTEXT") {
            self.default_context = context;
        }
        if let Some(api_key) = non_empty("OJS_API_KEY") {
            self.auth.api_key = api_key;
        }
        if let Some(flag) = non_empty("OJS_AUTO_REFRESH") {
            match parse_flag(&flag) {
                Some(enabled) => self.features.auto_refresh = enabled,
                None => tracing::warn!("Ignoring invalid OJS_AUTO_REFRESH value: {}", flag),
            }
        }
        self
    }

    /// Apply explicit overrides
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(base_url) = &overrides.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(context) = &overrides.context {
            self.default_context = context.clone();
        }
        if let Some(token) = &overrides.token {
            self.auth.api_key = token.clone();
        }
        self
    }

    /// Write the commented default config to `path` with an atomic write
    /// under an exclusive lock.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        // Create lock file (separate from config to avoid issues with rename)
        let lock_path = path.with_extension("toml.lock");
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

        lock_file
            .lock_exclusive()
            .with_context(|| "Failed to acquire config lock")?;

        let temp_path = path.with_extension("toml.tmp");
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        temp_file
            .write_all(DEFAULT_CONFIG.as_bytes())
            .with_context(|| "Failed to write config content")?;

        temp_file
            .sync_all()
            .with_context(|| "Failed to sync config file")?;

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename config file: {}", path.display()))?;

        // Lock is released when lock_file is dropped
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
