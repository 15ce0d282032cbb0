use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gateway::{
    config::{load_config, DEFAULT_CONFIG_PATH},
    logging::{init_logging, LoggingConfig, DEFAULT_LOG_LEVEL},
};
use tracing::{error, info};

/// Aggregate the tools of several MCP servers behind one namespaced,
/// compressed catalog served over stdio.
#[derive(Parser, Debug)]
#[command(name = "mcp-proxy-gateway", author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, env = "MCP_PROXY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    };
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli).await {
        error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Loading config from {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    info!("Configured upstreams: {}", config.upstreams.len());

    gateway::run(config).await
}
