use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "screenshot-service")]
#[command(about = "Request-triggered web screenshot service with caching")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Bind address")]
    pub bind: Option<String>,

    #[arg(short, long, help = "Server port")]
    pub port: Option<u16>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Cache TTL in seconds")]
    pub cache_ttl: Option<u64>,

    #[arg(long, help = "Navigation timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Disable the pre-navigation reachability probe")]
    pub no_probe: bool,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let default_directive = if verbose { "debug" } else { "info" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}
