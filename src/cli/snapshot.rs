//! Snapshot command implementation

use anyhow::{Context, Result};

use ojs_metrics::config::Config;
use ojs_metrics::stats::MetricsService;

/// Run one aggregation pass and print the snapshot as JSON
pub async fn snapshot_command(config: &Config, journal: Option<&str>) -> Result<()> {
    let service = MetricsService::from_config(config);

    let snapshot = service
        .dashboard(journal)
        .await
        .with_context(|| match journal {
            Some(path) => format!("Failed to fetch metrics for journal '{}'", path),
            None => "Failed to fetch metrics".to_string(),
        })?;

    let json = serde_json::to_string_pretty(snapshot.as_ref())
        .context("Failed to serialize snapshot")?;
    println!("{}", json);

    Ok(())
}
