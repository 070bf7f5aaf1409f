// Beacon API server
// Session-authenticated web service with supervised background maintenance.

mod config;
mod cookies;
mod handlers;
mod middleware;
mod routes;

use beacon_auth::{AuthService, CookieCodec};
use beacon_database::Database;
use beacon_tasks::{ShutdownCoordinator, Supervisor};
use config::Config;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;

/// Daily cadence for the expired-session sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct AppState {
    pub auth_service: AuthService,
    pub codec: CookieCodec,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,beacon_api=debug,tower_http=debug".to_string()),
        )
        .init();

    tracing::info!("Starting Beacon server");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();

    // Initialize database
    let database = Database::new(config.database.clone()).await?;
    database.ping().await?;
    database.migrate().await?;
    tracing::info!("Database connected");

    // Cookie signing key: process-wide, immutable after startup.
    let cookie_secret = match config.cookie_secret.clone() {
        Some(secret) => secret,
        None => {
            tracing::warn!(
                "COOKIE_SECRET_KEY not set; using an ephemeral secret, sessions will not survive a restart"
            );
            CookieCodec::generate_secret()
        }
    };

    let state = Arc::new(AppState {
        auth_service: AuthService::new(&database),
        codec: CookieCodec::new(&cookie_secret),
    });

    let supervisor = Supervisor::new();
    start_background_processes(&supervisor, &database);

    let coordinator = ShutdownCoordinator::default();
    coordinator.listen_for_signals();

    // Start server
    let app = routes::create_router(state);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server ready");

    let shutdown = coordinator.drain_requested();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    });

    coordinator.wait(server, &supervisor).await?;
    tracing::info!(%addr, "Stopped server");
    Ok(())
}

/// Persistent maintenance workers. Each sweep tick runs as a one-shot
/// worker so in-flight sweeps participate in the shutdown drain barrier;
/// the outer loop itself is abandoned at exit.
fn start_background_processes(supervisor: &Supervisor, database: &Database) {
    let service = Arc::new(AuthService::new(database));
    let spawner = supervisor.clone();

    supervisor.start_process("session cleanup", async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;

            let service = Arc::clone(&service);
            spawner.in_background("session cleanup", async move {
                match service.delete_expired_sessions().await {
                    Ok(count) => tracing::info!(count, "Cleared expired sessions"),
                    Err(e) => tracing::error!(error = %e, "Unable to clear expired sessions"),
                }
            });
        }
    });
}
