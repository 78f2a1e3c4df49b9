//! NoteVault API server entry point.

use std::net::SocketAddr;

use anyhow::Context;
use notevault_server::{create_router, db, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notevault_server=info,tower_http=info".into()),
        )
        .init();

    let config =
        Config::from_env().map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    tracing::info!("Starting notevault-server (env: {})", config.environment);

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations applied");

    if let Some(password) = &config.admin_password {
        if db::seed_admin(&pool, &config.admin_username, password).await? {
            tracing::info!(username = %config.admin_username, "Seeded initial admin account");
        }
    }

    let port = config.port;
    let state = AppState::new(pool, config);

    // Periodic rate limiter cleanup (every 5 minutes)
    let rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.cleanup().await;
        }
    });

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("notevault-server listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
