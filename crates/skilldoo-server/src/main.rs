mod config;

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{error, info};

use skilldoo_api::auth::hash_password;
use skilldoo_api::{AppState, AppStateInner};
use skilldoo_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skilldoo=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env().inspect_err(|e| error!("Configuration error: {:#}", e))?;

    let db = Database::open(&config.db_path)?;

    if let Some((email, password)) = &config.admin {
        let hash = hash_password(password).map_err(|e| anyhow!("hashing admin password: {}", e))?;
        let admin = db.ensure_admin(email, &hash)?;
        info!("Admin account ready: {} ({})", admin.email, admin.id);
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        token_ttl_days: config.token_ttl_days,
    });

    let app = skilldoo_api::router(state);

    info!("Skilldoo listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
