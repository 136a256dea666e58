use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use guildhall_server::config::ServerConfig;
use guildhall_server::db::pool::{create_pool, run_migrations};
use guildhall_server::media::storage::LocalFileStore;
use guildhall_server::web::app_state::AppState;
use guildhall_server::web::router::build_router;

#[derive(Parser)]
#[command(name = "guildhall-server", about = "Guildhall community server")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "guildhall.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;

    // Initialize database
    let pool = create_pool(&config.database.url)
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    let media_root = std::path::PathBuf::from(&config.storage.media_root);
    tokio::fs::create_dir_all(&media_root)
        .await
        .with_context(|| format!("failed to create media root {}", media_root.display()))?;

    let app_state = Arc::new(AppState {
        db: pool,
        store: Arc::new(LocalFileStore::new(media_root.clone())),
        media_root,
        auth_config: config.to_auth_config(),
        max_upload_bytes: config.max_upload_bytes(),
    });

    let app = build_router(app_state);

    let web_addr = &config.server.web_address;
    info!("Guildhall server starting on {}", web_addr);

    let listener = tokio::net::TcpListener::bind(web_addr)
        .await
        .with_context(|| format!("failed to bind web listener on {web_addr}"))?;

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
