use axum::extract::{Path, State};
use axum::Json;

use crate::app_state::AppState;
use crate::errors::AppError;
use crate::models::analysis::AnalysisRecord;
use crate::services::ids;

const NOT_FOUND: &str = "The result could not be found or has expired.";

/// GET /api/result/{id}: Current state of an analysis, for polling.
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisRecord>, AppError> {
    if !ids::is_well_formed(&id) {
        return Err(AppError::NotFound(NOT_FOUND.to_string()));
    }

    state
        .store
        .read(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))
}
