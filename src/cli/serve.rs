//! Serve command implementation

use anyhow::Result;
use tracing::{info, warn};

use ojs_metrics::config::Config;
use ojs_metrics::server::SnapshotServer;
use ojs_metrics::stats::MetricsService;

/// Keep snapshots fresh in the background and serve them over HTTP
pub async fn serve_command(config: &Config, port: Option<u16>) -> Result<()> {
    let service = MetricsService::from_config(config);
    let port = port.unwrap_or(config.server.port);

    if !config.is_auth_configured() {
        warn!("No API token configured; OJS statistics endpoints will reject requests");
    }

    // Polls the all-journals snapshot; with auto refresh off, reads load on demand
    let poller = service.start_auto_refresh();
    if poller.is_none() {
        info!("Auto refresh disabled, snapshots load on request");
    }

    let server = SnapshotServer::start(service, port)?;
    println!("Serving metrics on http://{}/metrics", server.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    if let Some(poller) = poller {
        poller.abort();
    }
    tokio::task::spawn_blocking(move || server.shutdown()).await?;

    Ok(())
}
