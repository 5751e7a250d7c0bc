// Favorites - Web Server

use anyhow::{Context, Result};
use favorites::api::{router, AppState};
use favorites::logging::init_logging;
use favorites::{open_database, Config, VERSION};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info,tower_http=debug");

    let config = Config::from_env().context("Invalid configuration")?;
    let conn = open_database(&config.db_path, config.db_busy_timeout)?;

    let addr = config.bind_addr();
    let app = router(AppState::new(conn, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, version = VERSION, "server listening");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
