use clap::Parser;
use screenshot_service::{
    metrics, setup_logging, shutdown_signal, validate_config, AppState, Cli, Config,
    ScreenshotService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting screenshot-service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;

    let metrics_handle = metrics::install_recorder()?;

    let service = Arc::new(ScreenshotService::with_chrome(config.clone()));
    let state = AppState {
        service,
        metrics: metrics_handle,
        started_at: Instant::now(),
    };

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(listener, screenshot_service::build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("screenshot-service stopped");
    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path).await?;
        serde_json::from_str(&config_content)?
    } else {
        Config::default()
    };

    // Override with CLI arguments
    if let Some(bind) = &args.bind {
        config.bind = bind.clone();
    }

    if let Some(port) = args.port {
        config.port = port;
    }

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    if let Some(ttl) = args.cache_ttl {
        config.cache_ttl = Duration::from_secs(ttl);
    }

    if let Some(timeout) = args.timeout {
        config.navigation_timeout = Duration::from_secs(timeout);
    }

    if args.no_probe {
        config.preflight_probe = false;
    }

    validate_config(&config).map_err(|e| anyhow::anyhow!(e))?;

    info!("Configuration loaded successfully");
    info!("Cache TTL: {:?}", config.cache_ttl);
    info!("Navigation timeout: {:?}", config.navigation_timeout);
    info!("Size ceiling: {} bytes", config.size_ceiling);

    Ok(config)
}
