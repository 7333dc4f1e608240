use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::Instant;

use crate::app_state::AppState;
use crate::services::store::ResultStore;

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Ok,
    Error,
}

#[derive(Serialize)]
pub struct StoreProbe {
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub store: StoreProbe,
}

async fn probe_store(store: &ResultStore) -> StoreProbe {
    let started = Instant::now();
    match store.ping().await {
        Ok(()) => StoreProbe {
            status: ProbeStatus::Ok,
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Result store unreachable");
            StoreProbe {
                status: ProbeStatus::Error,
                latency_ms: None,
            }
        }
    }
}

/// GET /health: the process is up and the result store answers.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let store = probe_store(&state.store).await;
    let (code, status) = match store.status {
        ProbeStatus::Ok => (StatusCode::OK, "ok"),
        ProbeStatus::Error => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };

    let report = HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        store,
    };
    (code, Json(report))
}
