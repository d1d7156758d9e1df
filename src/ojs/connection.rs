//! Connectivity check for a single journal

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use super::endpoints::{JournalApi, PublicationStatsQuery};

/// Outcome of probing the statistics endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub connected: bool,
    pub message: String,
    /// Endpoint name -> reachable
    pub endpoints: BTreeMap<String, bool>,
}

impl ConnectionReport {
    fn unauthenticated() -> Self {
        Self {
            connected: false,
            message: "No API token configured".to_string(),
            endpoints: BTreeMap::new(),
        }
    }

    pub fn available(&self) -> usize {
        self.endpoints.values().filter(|ok| **ok).count()
    }
}

/// Query the publications, editorial and users endpoints of `context`.
///
/// Connected means at least one endpoint answered. Without a token nothing is
/// requested, since every statistics endpoint requires authentication.
pub async fn check_connection(
    api: &dyn JournalApi,
    auth_configured: bool,
    context: &str,
) -> ConnectionReport {
    if !auth_configured {
        warn!("[ojs] No API token configured, skipping connection check");
        return ConnectionReport::unauthenticated();
    }

    let query = PublicationStatsQuery::count_only();
    let (publications, editorial, users) = tokio::join!(
        api.publication_stats(context, &query),
        api.editorial_stats(context, None),
        api.user_stats(context, None),
    );

    let mut endpoints = BTreeMap::new();
    for (name, result) in [
        ("publications", publications.map(|_| ())),
        ("editorial", editorial.map(|_| ())),
        ("users", users.map(|_| ())),
    ] {
        if let Err(e) = &result {
            warn!("[ojs] {} endpoint unavailable for {}: {}", name, context, e);
        }
        endpoints.insert(name.to_string(), result.is_ok());
    }

    let total = endpoints.len();
    let available = endpoints.values().filter(|ok| **ok).count();
    let report = if available == 0 {
        ConnectionReport {
            connected: false,
            message: "Failed to connect to OJS API".to_string(),
            endpoints,
        }
    } else {
        ConnectionReport {
            connected: true,
            message: format!("Connected ({available}/{total} endpoints available)"),
            endpoints,
        }
    };
    info!("[ojs] {}: {}", context, report.message);
    report
}
