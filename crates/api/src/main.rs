use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conductor_api::config::ServerConfig;
use conductor_api::router::build_app_router;
use conductor_api::state::AppState;
use conductor_db::PgStore;
use conductor_events::ChannelRegistry;
use conductor_pipeline::{Orchestrator, OrchestratorConfig, ProviderRegistry};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conductor_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = conductor_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    conductor_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    conductor_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Services ---
    let store = Arc::new(PgStore::new(pool));
    let providers = Arc::new(ProviderRegistry::with_defaults());
    let channels = Arc::new(ChannelRegistry::new());

    let orchestrator = Orchestrator::new(
        store,
        providers,
        Arc::clone(&channels),
        OrchestratorConfig {
            approval_timeout_secs: config.approval_timeout_secs,
        },
    );

    // Reconcile executions stranded by the previous process.
    let reconciled = orchestrator
        .recover()
        .await
        .expect("Failed to recover persisted executions");
    if reconciled > 0 {
        tracing::info!(reconciled, "Recovered executions left over from previous run");
    }

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        channels: Arc::clone(&channels),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    orchestrator.shutdown().await;
    tracing::info!("Running executions signalled to stop");

    let channel_count = channels.channel_count().await;
    tracing::info!(channel_count, "Remaining update channels at shutdown");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
