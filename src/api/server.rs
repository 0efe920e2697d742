use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_check, index, list_watchers, trigger, AppState};
use crate::config::AppConfig;
use crate::scheduler::PassWorker;
use crate::service::MonitorService;

/// How long shutdown waits for a scheduled pass to finish its state writes
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/trigger", post(trigger))
        .route("/watchers", get(list_watchers))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server, and the interval worker when configured
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service = Arc::new(MonitorService::from_config(&config)?);

    match service.reload_watchers().await {
        Some(count) => tracing::info!("Loaded {} watchers", count),
        None => tracing::warn!("Starting without watchers"),
    }

    let worker = config.check_interval.map(|interval| {
        let worker = Arc::new(PassWorker::new(Arc::clone(&service), interval));
        let handle = Arc::clone(&worker).start();
        (worker, handle)
    });

    let state = Arc::new(AppState {
        service: Arc::clone(&service),
    });
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting Watchbell server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some((worker, handle)) = worker {
        worker.stop();
        match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Pass worker terminated abnormally"),
            Err(_) => tracing::warn!("Pass worker still running after {:?}", SHUTDOWN_GRACE),
        }
    }

    tracing::info!("Watchbell server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received");
}
