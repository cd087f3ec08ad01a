use clap::Parser;
use passkeep_server::config::{Backend, ServerConfig};
use passkeep_server::server::{build_router, shutdown_signal, AppState};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "passkeep-server", about = "passkeep record sync server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "server.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Storage backend override
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Database path override
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Token signing secret override
    #[arg(long, env = "PASSKEEP_TOKEN_SECRET", hide_env_values = true)]
    token_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(backend) = cli.backend {
        cfg.backend = backend;
    }
    if let Some(database) = cli.database {
        cfg.storage_path = database;
    }
    if let Some(secret) = cli.token_secret {
        cfg.token_secret = secret;
    }
    cfg.validate()?;

    tracing::info!("Starting passkeep server on {}", cfg.listen_addr);

    let state = AppState::open(&cfg)?;
    let app = build_router(state, &cfg);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
