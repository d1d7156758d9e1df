//! Check command implementation

use anyhow::{Result, bail};

use ojs_metrics::config::Config;
use ojs_metrics::stats::MetricsService;

/// Check the statistics endpoints of one journal and print the report
pub async fn check_command(config: &Config, journal: Option<&str>) -> Result<()> {
    let service = MetricsService::from_config(config);
    let journal = journal.unwrap_or(&config.default_context);

    println!("OJS:     {}", config.context_url(journal));
    println!(
        "Token:   {}",
        if config.is_auth_configured() {
            "configured"
        } else {
            "missing"
        }
    );

    let report = service.check_connection(Some(journal)).await;
    for (endpoint, ok) in &report.endpoints {
        println!("  {:<13} {}", endpoint, if *ok { "ok" } else { "unavailable" });
    }
    println!("{}", report.message);

    if !report.connected {
        bail!("Could not reach the statistics API of '{}'", journal);
    }
    Ok(())
}
