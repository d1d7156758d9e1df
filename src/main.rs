use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use ojs_metrics::config::{Config, ConfigOverrides};

mod cli;

#[derive(Parser)]
#[command(name = "ojs-metrics")]
#[command(about = "Aggregated editorial and readership statistics for OJS journals")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.ojs-metrics/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the OJS installation (overrides config and OJS_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Default journal path (overrides config and OJS_CONTEXT)
    #[arg(long, global = true)]
    context: Option<String>,

    /// API token (overrides config and OJS_API_KEY)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a dashboard snapshot once and print it as JSON
    Snapshot {
        /// Journal path, or "all" for every enabled journal
        #[arg(short, long)]
        journal: Option<String>,
    },

    /// Check which statistics endpoints are reachable with the configured token
    Check {
        /// Journal path (defaults to the configured default context)
        #[arg(short, long)]
        journal: Option<String>,
    },

    /// Serve cached snapshots over HTTP and keep them fresh
    Serve {
        /// Port to listen on (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write a commented default configuration file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        base_url: cli.base_url,
        context: cli.context,
        token: cli.token,
    };
    let config_path = cli.config;
    let verbose = cli.verbose;

    match cli.command.unwrap_or(Commands::Snapshot { journal: None }) {
        Commands::Snapshot { journal } => {
            let config = load_config(config_path.as_deref(), &overrides, verbose)?;
            cli::snapshot::snapshot_command(&config, journal.as_deref()).await?;
        }
        Commands::Check { journal } => {
            let config = load_config(config_path.as_deref(), &overrides, verbose)?;
            cli::check::check_command(&config, journal.as_deref()).await?;
        }
        Commands::Serve { port } => {
            let config = load_config(config_path.as_deref(), &overrides, verbose)?;
            cli::serve::serve_command(&config, port).await?;
        }
        Commands::Init { force } => {
            init_logging(verbose);
            cli::init::init_command(config_path, force).await?;
        }
    }

    Ok(())
}

/// Resolve the effective config, then start logging at its level
fn load_config(path: Option<&Path>, overrides: &ConfigOverrides, verbose: bool) -> Result<Config> {
    let config = Config::resolve(path, overrides)?;
    init_logging(verbose || config.features.debug_mode);
    Ok(config)
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}
