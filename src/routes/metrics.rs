use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Register descriptions for the analysis metrics.
pub fn describe() {
    metrics::describe_counter!("analysis_submitted_total", "Analyses accepted at intake");
    metrics::describe_counter!(
        "analysis_completed_total",
        "Analyses that reached the completed state"
    );
    metrics::describe_counter!(
        "analysis_failed_total",
        "Analyses rejected by palm validation, by reason"
    );
    metrics::describe_counter!(
        "analysis_fallback_total",
        "Analyses completed with a canned fallback job"
    );
    metrics::describe_counter!(
        "analysis_runs_aborted_total",
        "Background runs stopped by a store error"
    );
    metrics::describe_histogram!(
        "analysis_duration_seconds",
        "Time from dispatch to terminal state of an analysis run"
    );
}

/// GET /metrics: Prometheus text exposition.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
