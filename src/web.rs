#![cfg(not(tarpaulin_include))]

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vizboard::{Config, app};

/// Command line options for the web server
#[derive(Parser, Debug)]
#[command(name = "website", about = "Upload CSV datasets and chart them in the browser")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

/// Main entry point for the web application
///
/// Installs the log subscriber (`RUST_LOG`, default `info`), loads the
/// configuration and runs the server until it exits.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    app::run(config).await
}
