//! Wire types for the OJS statistics API
//!
//! Field names follow the upstream JSON (camelCase). Numeric fields default
//! to zero when missing so a sparse response still deserializes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A string the API returns either plain or keyed by locale
/// (e.g. `"Title"` or `{"en_US": "Title", "fr_CA": null}`).
///
/// Untranslated locales come back as `null` and count as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedString {
    Plain(String),
    Localized(BTreeMap<String, Option<String>>),
}

impl Default for LocalizedString {
    fn default() -> Self {
        Self::Localized(BTreeMap::new())
    }
}

impl LocalizedString {
    /// Single-locale value
    pub fn with_locale(locale: &str, text: impl Into<String>) -> Self {
        Self::Localized(BTreeMap::from([(locale.to_string(), Some(text.into()))]))
    }

    /// Resolve to display text.
    ///
    /// Lookup order: `locale`, `en_US`, `en`, first non-empty entry, `default`.
    pub fn resolve<'a>(&'a self, locale: &str, default: &'a str) -> &'a str {
        match self {
            Self::Plain(text) if !text.trim().is_empty() => text,
            Self::Plain(_) => default,
            Self::Localized(values) => {
                let lookup = |key: &str| values.get(key).and_then(non_empty);
                lookup(locale)
                    .or_else(|| lookup("en_US"))
                    .or_else(|| lookup("en"))
                    .or_else(|| values.values().find_map(non_empty))
                    .unwrap_or(default)
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Resolve an optional localized value, see [`LocalizedString::resolve`].
pub fn resolve_localized<'a>(
    value: Option<&'a LocalizedString>,
    locale: &str,
    default: &'a str,
) -> &'a str {
    value.map_or(default, |v| v.resolve(locale, default))
}

/// One row of `GET /stats/publications`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationStat {
    #[serde(default)]
    pub abstract_views: u64,
    #[serde(default)]
    pub galley_views: u64,
    #[serde(default)]
    pub pdf_views: u64,
    #[serde(default)]
    pub html_views: u64,
    #[serde(default)]
    pub other_views: u64,
    #[serde(default)]
    pub publication: PublicationSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationSummary {
    #[serde(default)]
    pub id: u64,
    #[serde(default, rename = "_href")]
    pub href: String,
    #[serde(default)]
    pub url_workflow: Option<String>,
    #[serde(default)]
    pub url_published: Option<String>,
    #[serde(default)]
    pub authors_string_short: Option<String>,
    #[serde(default)]
    pub full_title: Option<LocalizedString>,
}

/// `GET /stats/publications`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationStatsResponse {
    #[serde(default)]
    pub items: Vec<PublicationStat>,
    #[serde(default)]
    pub items_max: u64,
}

/// Key/value row of `GET /stats/editorial` and `GET /stats/users`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatEntry {
    pub key: String,
    #[serde(default)]
    pub name: Option<LocalizedString>,
    #[serde(default)]
    pub value: f64,
}

/// Look up a statistic by key
pub fn stat_value(entries: &[StatEntry], key: &str) -> Option<f64> {
    entries.iter().find(|s| s.key == key).map(|s| s.value)
}

/// `GET /stats/editorial/averages`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorialAverages {
    #[serde(default)]
    pub submissions_received_per_year: f64,
    #[serde(default)]
    pub submissions_accepted_per_year: f64,
    #[serde(default)]
    pub submissions_declined_per_year: f64,
}

/// One interval of `GET /stats/publications/{abstract,galley}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: String,
    #[serde(default)]
    pub value: u64,
}

/// A journal hosted on the OJS site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalContext {
    pub id: u64,
    pub url_path: String,
    #[serde(default)]
    pub name: LocalizedString,
    #[serde(default)]
    pub description: Option<LocalizedString>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, rename = "_href")]
    pub href: String,
}

fn default_enabled() -> bool {
    true
}

impl JournalContext {
    pub fn display_name<'a>(&'a self, locale: &str) -> &'a str {
        self.name.resolve(locale, &self.url_path)
    }
}

/// `GET /index.php/index/api/v1/contexts`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextsResponse {
    #[serde(default)]
    pub items: Vec<JournalContext>,
    #[serde(default)]
    pub items_max: u64,
}
