use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::Json;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::errors::AppError;
use crate::models::intake::{AnalyzeResponse, Gender};
use crate::services::ids;
use crate::services::images::UploadedImage;
use crate::services::pipeline::AnalysisRequest;

const LEFT_FIELD: &str = "leftImage";
const RIGHT_FIELD: &str = "rightImage";
const GENDER_FIELD: &str = "gender";

/// Raw multipart fields, before any checks.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub left: Option<Bytes>,
    pub right: Option<Bytes>,
    pub gender: Option<String>,
}

/// Upload that passed every intake check.
#[derive(Debug)]
pub struct ValidatedUpload {
    pub left: UploadedImage,
    pub right: UploadedImage,
    pub gender: Option<Gender>,
}

#[derive(Clone, Copy)]
enum Hand {
    Left,
    Right,
}

impl Hand {
    fn name(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

fn require_image(bytes: Option<Bytes>, hand: Hand) -> Result<UploadedImage, AppError> {
    let bytes = bytes.filter(|b| !b.is_empty()).ok_or_else(|| {
        AppError::BadRequest(format!("Please upload a photo of your {} palm.", hand.name()))
    })?;
    UploadedImage::sniff(bytes).ok_or_else(|| {
        AppError::BadRequest(format!("The {}-hand file must be an image.", hand.name()))
    })
}

const MIB: usize = 1024 * 1024;

fn describe_limit(max_bytes: usize) -> String {
    if max_bytes % MIB == 0 {
        format!("{} MB", max_bytes / MIB)
    } else if max_bytes > MIB {
        format!("{:.1} MB", max_bytes as f64 / MIB as f64)
    } else {
        format!("{} KB", max_bytes.div_ceil(1024))
    }
}

fn check_size(image: &UploadedImage, hand: Hand, max_bytes: usize) -> Result<(), AppError> {
    if image.len() > max_bytes {
        return Err(AppError::BadRequest(format!(
            "The {}-hand photo must be {} or smaller.",
            hand.name(),
            describe_limit(max_bytes)
        )));
    }
    Ok(())
}

/// Intake checks in order, stopping at the first failure: both images
/// present and recognisable, each within the size ceiling, gender (if
/// given) from the fixed set.
pub fn validate_upload(form: UploadForm, max_image_bytes: usize) -> Result<ValidatedUpload, AppError> {
    let left = require_image(form.left, Hand::Left)?;
    let right = require_image(form.right, Hand::Right)?;

    check_size(&left, Hand::Left, max_image_bytes)?;
    check_size(&right, Hand::Right, max_image_bytes)?;

    let gender = match form.gender.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<Gender>().map_err(|_| {
            AppError::BadRequest("Gender must be either \"male\" or \"female\".".to_string())
        })?),
    };

    Ok(ValidatedUpload { left, right, gender })
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(LEFT_FIELD) | Some(RIGHT_FIELD) => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
                if name.as_deref() == Some(LEFT_FIELD) {
                    form.left = Some(data);
                } else {
                    form.right = Some(data);
                }
            }
            Some(GENDER_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
                form.gender = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /api/analyze: Upload a left/right palm pair for analysis.
///
/// Responds as soon as the record exists; the analysis itself runs on a
/// detached task and is observed through `GET /api/result/{id}`.
pub async fn submit_analysis(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let form = read_form(multipart).await?;
    let upload = validate_upload(form, state.max_image_bytes)
        .inspect_err(|e| warn!(error = %e, "Rejected upload"))?;

    let id = ids::new_analysis_id();
    let record = state.store.create(&id).await?;
    metrics::counter!("analysis_submitted_total").increment(1);

    info!(
        analysis_id = %id,
        left_bytes = upload.left.len(),
        right_bytes = upload.right.len(),
        gender = ?upload.gender,
        "Analysis submitted"
    );

    state.pipeline.spawn(AnalysisRequest {
        id: id.clone(),
        left: upload.left,
        right: upload.right,
        gender: upload.gender,
    });

    Ok(Json(AnalyzeResponse {
        id,
        status: record.status,
    }))
}
