use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pair_relay::config::DEFAULT_CONFIG_FILE;
use pair_relay::{AppState, RelayConfig, create_router};

#[derive(Parser)]
#[command(name = "pair-relay")]
#[command(about = "WebSocket relay for private one-to-one chats")]
struct Args {
    /// Port for the HTTP server (0 for automatic; overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides the config file)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging; RUST_LOG wins when set
    let default_filter = if args.debug {
        "pair_relay=debug,tower_http=debug"
    } else {
        "pair_relay=info,tower_http=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RelayConfig::load(&args.config, args.host.as_deref(), args.port)?;
    let state = AppState::new(&config);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    // Get the actual bound port (important when port was 0)
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on http://{}", actual_addr);
    info!("");
    info!("Endpoints:");
    info!("  GET  /            - Chat page");
    info!("  GET  /health      - Liveness probe");
    info!("  GET  /api/metrics - Relay metrics");
    info!("  GET  /ws          - WebSocket relay");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, exiting gracefully");
}
