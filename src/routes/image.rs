use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::app_state::AppState;
use crate::errors::AppError;
use crate::services::ids;
use crate::services::images;
use crate::services::store::BlobKind;

const NOT_FOUND: &str = "The image could not be found or has expired.";

/// GET /api/image/{id}/{kind}: Serve a stored card image.
pub async fn get_image(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound(NOT_FOUND.to_string());

    if !ids::is_well_formed(&id) {
        return Err(not_found());
    }
    let kind: BlobKind = kind.parse().map_err(|_| not_found())?;

    let bytes = state.store.read_blob(&id, kind).await?.ok_or_else(not_found)?;
    let content_type = images::sniff_format(&bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        bytes,
    ))
}
