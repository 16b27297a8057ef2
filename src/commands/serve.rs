//! Serve command - Starts the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, Database, ObjectStorage, S3Storage};
use crate::jobs::{EmailQueue, PgEmailQueue};
use crate::services::AuthService;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: Config) -> AppResult<()> {
    tracing::info!("Starting server...");

    let db = Arc::new(Database::connect(&config).await?);

    let cache = Arc::new(
        Cache::connect(&config)
            .await
            .map_err(|e| AppError::internal(format!("Failed to connect to Redis: {}", e)))?,
    );

    let storage: Arc<dyn ObjectStorage> = Arc::new(S3Storage::connect(config.storage.clone()).await);

    let email_queue: Arc<dyn EmailQueue> =
        Arc::new(PgEmailQueue::connect(&config.database_url).await?);
    tracing::info!("Email queue ready");

    let addr = match (args.host, args.port) {
        (None, None) => config.server_addr(),
        (host, port) => format!(
            "{}:{}",
            host.unwrap_or_else(|| config.server_host.clone()),
            port.unwrap_or(config.server_port)
        ),
    };
    let cleanup_every = Duration::from_secs(config.session_cleanup_interval_minutes.max(1) * 60);
    let app_state = AppState::from_config(db, cache, storage, email_queue, config);

    spawn_session_cleanup(app_state.auth_service.clone(), cleanup_every);

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Periodically delete expired refresh sessions.
fn spawn_session_cleanup(auth: Arc<dyn AuthService>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = auth.purge_expired_sessions().await {
                tracing::warn!(error = %e, "Session cleanup failed");
            }
        }
    });
}
