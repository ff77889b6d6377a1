use anyhow::{Context, Result};
use clap::Parser;
use mitra_server::config::ServerConfig;
use mitra_server::{build_app, init_logging, start_server, AppState};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "mitra-server")]
#[command(about = "Chat assistant API with sandboxed code execution")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "MITRA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let level = if args.verbose { "debug" } else { config.server.log_level.as_str() };
    init_logging(level, &config.server.log_format);

    info!("Starting Mitra server v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::from_config(&config)?;
    let capabilities = state.sandbox.capabilities().await;
    info!(
        python = capabilities.python,
        java = capabilities.java,
        "Language toolchains probed"
    );

    let app = build_app(state, &config)?;
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    start_server(listener, app).await
}
