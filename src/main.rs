//! cachr: a caching HTTP/1.x reverse proxy.
//!
//! ```text
//!     Client ──▶ listener ──▶ state machine ──miss──▶ upstream target
//!                                  │   ▲                    │
//!                                  hit └──── cache ◀────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use cachr::config::load_config;
use cachr::lifecycle::startup;
use cachr::observability::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "cachr", version, about = "Caching HTTP/1.x reverse proxy")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "cachr.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    init_tracing(&config.observability.log_level);
    tracing::info!(config = %cli.config.display(), "cachr v{} starting", env!("CARGO_PKG_VERSION"));

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
