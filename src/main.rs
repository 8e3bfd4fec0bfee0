use anyhow::{Context, Result};
use chrono::Duration;

use stock_ford_extension::{
    config::Config,
    db,
    services::auth_service::{self, PasswordHasher},
    services::token_service::AuthKeys,
    telemetry, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = Config::from_env()?;

    // Startup failures are fatal: no point serving without storage.
    let pool = db::connect(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let hasher = PasswordHasher::new(config.bcrypt_cost).context("invalid BCRYPT_COST")?;
    if let Some((username, password)) = &config.bootstrap_admin {
        let created = auth_service::ensure_admin(&pool, &hasher, username, password)
            .await
            .context("failed to create bootstrap admin")?;
        if created {
            tracing::info!(%username, "bootstrap admin created");
        }
    }

    let keys = AuthKeys::new(&config.jwt_secret, Duration::days(config.token_ttl_days));
    let app = stock_ford_extension::app(AppState::new(pool.clone(), keys, hasher));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = term => {} }
}
