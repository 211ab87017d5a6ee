use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use smartbox_api::actuator::LoggingActuator;
use smartbox_api::background::{expiry_sweep::ExpirySweeper, shared_key_retention};
use smartbox_api::config::ServerConfig;
use smartbox_api::router::build_app_router;
use smartbox_api::state::AppState;
use smartbox_db::{DbConfig, DbPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let db_config = DbConfig::from_env();
    let pool = smartbox_db::create_pool(&db_config)
        .await
        .expect("Failed to connect to database");
    tracing::info!(
        max_connections = db_config.max_connections,
        "Database connection pool created"
    );

    smartbox_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    smartbox_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready, migrations applied");

    let cancel = CancellationToken::new();
    let tasks = spawn_background_tasks(&pool, &config, &cancel);

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        actuator: Arc::new(LoggingActuator),
    };
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections");
    cancel.cancel();
    join_background_tasks(tasks, Duration::from_secs(config.shutdown_timeout_secs)).await;
    tracing::info!("Graceful shutdown complete");
}

/// `RUST_LOG` filters; `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "smartbox_api=debug,smartbox_db=info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn spawn_background_tasks(
    pool: &DbPool,
    config: &ServerConfig,
    cancel: &CancellationToken,
) -> Vec<(&'static str, JoinHandle<()>)> {
    let sweeper = ExpirySweeper::new(
        pool.clone(),
        Duration::from_secs(config.sweep_interval_secs),
    )
    .with_cancellation(cancel.clone());
    let sweep = tokio::spawn(async move { sweeper.run().await });

    let retention = tokio::spawn(shared_key_retention::run(
        pool.clone(),
        config.shared_key_retention_days,
        cancel.clone(),
    ));

    tracing::info!("Background tasks started");
    vec![("expiry sweep", sweep), ("shared key retention", retention)]
}

/// Wait for each task to observe cancellation. A sweep in progress stops
/// after the rent it is completing; the rest are picked up on the next start.
async fn join_background_tasks(tasks: Vec<(&'static str, JoinHandle<()>)>, grace: Duration) {
    for (name, handle) in tasks {
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => tracing::debug!(task = name, "Background task stopped"),
            Ok(Err(e)) => tracing::error!(task = name, error = %e, "Background task panicked"),
            Err(_) => tracing::warn!(task = name, "Background task did not stop in time"),
        }
    }
}

/// Resolve on SIGINT, or SIGTERM on Unix.
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
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
