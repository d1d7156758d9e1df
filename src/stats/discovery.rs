//! Resolve which journals to aggregate

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{MetricsError, Result};
use crate::ojs::{JournalApi, JournalContext, LocalizedString};

fn synthetic_context(id: u64, url_path: &str, name: &str) -> JournalContext {
    JournalContext {
        id,
        url_path: url_path.to_string(),
        name: LocalizedString::with_locale("en", name),
        description: None,
        enabled: true,
        href: String::new(),
    }
}

/// Journals listed in the config, with ids assigned by position from 1
pub fn configured_contexts(config: &Config) -> Vec<JournalContext> {
    config
        .journals
        .iter()
        .enumerate()
        .map(|(idx, journal)| {
            synthetic_context(idx as u64 + 1, &journal.url_path, &journal.name)
        })
        .collect()
}

/// The single-journal fallback built from `default_context`
pub fn default_contexts(config: &Config) -> Vec<JournalContext> {
    vec![synthetic_context(1, &config.default_context, &config.default_context)]
}

/// Resolve the enabled journals.
///
/// Order of preference: the configured list, the site-level contexts
/// endpoint, the default context. Fails with
/// [`MetricsError::NoEnabledJournals`] when nothing enabled remains.
pub async fn discover_contexts(
    api: &dyn JournalApi,
    config: &Config,
) -> Result<Vec<JournalContext>> {
    let mut contexts = configured_contexts(config);

    if contexts.is_empty() {
        contexts = match api.contexts().await {
            Ok(found) => {
                info!(
                    "[discovery] Found {} journals via contexts endpoint",
                    found.len()
                );
                found
            }
            Err(e) => {
                warn!(
                    "[discovery] Could not fetch contexts and no journals configured, using {}: {}",
                    config.default_context, e
                );
                default_contexts(config)
            }
        };
    }

    let enabled: Vec<JournalContext> = contexts.into_iter().filter(|c| c.enabled).collect();
    if enabled.is_empty() {
        return Err(MetricsError::NoEnabledJournals);
    }
    Ok(enabled)
}
