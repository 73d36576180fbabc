use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canopy_api::config::{LogFormat, ServerConfig};
use canopy_api::echo::{EchoGenerator, HttpEchoGenerator};
use canopy_api::router::build_app_router;
use canopy_api::state::AppState;
use canopy_api::trust::{RemoteTrustService, TrustService};
use canopy_api::ws::Hub;
use canopy_state::StateServices;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let (pretty, json) = match config.log_format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canopy_api=debug,canopy_state=debug,tower_http=debug".into()),
        )
        .with(pretty)
        .with(json)
        .init();

    tracing::info!(
        host = %config.host,
        port = %config.port,
        deploy_mode = %config.deploy_mode,
        "Loaded server configuration"
    );

    // --- Database ---
    let pool = canopy_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    canopy_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    canopy_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let services = StateServices::new(pool.clone());

    // --- Trust service ---
    let trust: Arc<dyn TrustService> = Arc::new(
        RemoteTrustService::new(&config.trust_service_url, &config.trust_request_secret)
            .expect("Failed to build trust service client"),
    );
    if config.trust_request_secret.is_empty() {
        tracing::warn!("TRUST_REQUEST_SECRET is empty, trust service requests are signed with an empty key");
    }

    // --- Echo generator ---
    let echo: Option<Arc<dyn EchoGenerator>> = match &config.echo_endpoint {
        Some(endpoint) => {
            let generator =
                HttpEchoGenerator::new(endpoint).expect("Failed to build echo generator client");
            tracing::info!(%endpoint, "Echo generator enabled");
            Some(Arc::new(generator))
        }
        None => {
            tracing::info!("Echo generator disabled");
            None
        }
    };

    // --- Realtime hub ---
    let (hub, hub_handle) = Hub::new(services.clone(), Arc::clone(&trust), echo);
    let hub_cancel = CancellationToken::new();
    let hub_task = tokio::spawn(hub.run(hub_cancel.clone()));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        services,
        hub: hub_handle,
        trust,
    };

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

    hub_cancel.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        hub_task,
    )
    .await;
    tracing::info!("Realtime hub stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
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
