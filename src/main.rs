use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use palm_job::{app_state::AppState, config::AppConfig, routes, services::store::RedisBackend};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

/// API router plus `/metrics` and the HTTP middleware stack.
fn build_app(state: AppState, metrics: Arc<PrometheusHandle>, body_limit: usize) -> Router {
    let metrics_route = Router::new()
        .route("/metrics", get(routes::metrics::prometheus_metrics))
        .with_state(metrics);

    routes::build_router(state)
        .merge(metrics_route)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");
    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; every analysis will be rejected as UNKNOWN");
    }

    let recorder = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    routes::metrics::describe();

    tracing::info!("Connecting result store");
    let backend = RedisBackend::connect(&config.redis_url)
        .await
        .expect("Failed to connect to Redis");

    let state = AppState::new(&config, Arc::new(backend)).expect("Failed to build provider client");
    let app = build_app(state, Arc::new(recorder), config.body_limit());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(addr = %config.bind_addr, "palm-job listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Runs still in flight are abandoned with the runtime; their records
    // keep the last persisted state until the TTL removes them.
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
