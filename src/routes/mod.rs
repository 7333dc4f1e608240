use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod analyze;
pub mod health;
pub mod image;
pub mod metrics;
pub mod result;

/// API routes. Body limits are applied per request by the caller's
/// `RequestBodyLimitLayer`, so axum's default cap is lifted here.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/analyze", post(analyze::submit_analysis))
        .route("/api/result/{id}", get(result::get_result))
        .route("/api/image/{id}/{kind}", get(image::get_image))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
