//! Gate check run before the (more expensive) analysis call: is this a
//! usable pair of left/right palm photos?

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::prompt_log::{PromptLog, PromptLogKind, PromptMetadata, PromptResponse, PromptText};
use crate::models::validation::{UploadErrorType, ValidationDetails, ValidationOutcome};
use crate::services::diagnostics::PromptLogger;
use crate::services::images::EncodedPair;
use crate::services::json_extract;
use crate::services::openai::{AiError, OpenAiClient, VisionChat};
use crate::services::prompts::{PromptSource, PromptTemplate};

pub const PROMPT_FILE: &str = "palm-validation.prompt";

const MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f32 = 0.3;
const IMAGE_DETAIL: &str = "low";

const FALLBACK_SYSTEM_PROMPT: &str = r#"You are an expert at checking palm photos. Decide whether the uploaded images are palm photos and whether their quality is good enough for palm reading.

## Checks
1. Is each image a palm (not the back of a hand, not another object)?
2. Is the first image a left hand and the second a right hand?
3. Quality: the whole palm is visible, the photo is bright enough, in focus, and the palm lines are visible.

## Response format (JSON only)
{
  "isValid": true/false,
  "errorType": "NOT_PALM" | "PALM_CROPPED" | "TOO_DARK" | "TOO_BLURRY" | "HAND_MISMATCH" | null,
  "details": {
    "isPalm": true/false,
    "isLeftHand": true/false,
    "isRightHand": true/false,
    "isComplete": true/false,
    "isBright": true/false,
    "isClear": true/false,
    "hasPalmLines": true/false
  },
  "message": "Short explanation of the result"
}"#;

const FALLBACK_USER_PROMPT: &str = r#"Please check the following two images:
1. First image: must be a left palm
2. Second image: must be a right palm

Check that each image is a palm, that its quality allows analysis, and that the hands are the right way round. Respond in JSON only."#;

/// Validation client backed by a vision chat model.
pub struct PalmValidator {
    ai: Arc<OpenAiClient>,
    prompts: PromptSource,
}

impl PalmValidator {
    pub fn new(ai: Arc<OpenAiClient>, prompt_dir: &Path) -> Self {
        Self {
            ai,
            prompts: PromptSource::new(
                prompt_dir.join(PROMPT_FILE),
                FALLBACK_SYSTEM_PROMPT,
                FALLBACK_USER_PROMPT,
            ),
        }
    }

    /// Validate a palm pair. Never fails: provider and parse errors become
    /// an `UNKNOWN` rejection.
    pub async fn validate(
        &self,
        analysis_id: &str,
        images: &EncodedPair,
        logger: &PromptLogger,
    ) -> ValidationOutcome {
        if !self.ai.is_configured() {
            error!(analysis_id, "OPENAI_API_KEY is not set, rejecting validation");
            return ValidationOutcome::rejected(
                UploadErrorType::Unknown,
                "The AI service is not configured.",
            );
        }

        let template = self.prompts.get().await;
        let chat = VisionChat {
            model: MODEL,
            system: &template.system,
            user: &template.user,
            images: [images.left.as_str(), images.right.as_str()],
            image_detail: IMAGE_DETAIL,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let content = match self.ai.chat_with_images(&chat).await {
            Ok(content) => content,
            Err(e) => {
                error!(analysis_id, error = %e, "Palm validation request failed");
                logger.record(base_log(analysis_id, template).with_error(e.to_string()));
                return ValidationOutcome::rejected(
                    UploadErrorType::Unknown,
                    "An error occurred while checking the photos.",
                );
            }
        };

        let outcome = match interpret_reply(&content) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(analysis_id, error = %e, "Could not interpret validation response");
                ValidationOutcome::rejected(
                    UploadErrorType::Unknown,
                    "The photo check returned an unreadable result.",
                )
            }
        };

        let mut log = base_log(analysis_id, template).with_response(PromptResponse {
            raw_response: content,
            ..PromptResponse::default()
        });
        if let Some(reason) = outcome.rejection() {
            log = log.with_error(reason.to_string());
        }
        logger.record(log);

        info!(
            analysis_id,
            is_valid = outcome.is_valid,
            error_type = ?outcome.error_type,
            "Palm validation complete"
        );
        outcome
    }
}

/// Turn raw model text into an outcome. Only a boolean `isValid` is
/// required; the other fields are read leniently and dropped when malformed.
/// A rejection without a reason is `NOT_PALM`.
fn interpret_reply(content: &str) -> Result<ValidationOutcome, AiError> {
    let reply: Value = json_extract::extract_object(content)?;
    let is_valid = reply
        .get("isValid")
        .and_then(Value::as_bool)
        .ok_or_else(|| AiError::Invalid("missing boolean isValid".to_string()))?;

    let error_type = (!is_valid).then(|| {
        reply
            .get("errorType")
            .and_then(Value::as_str)
            .map(UploadErrorType::from_code)
            .unwrap_or(UploadErrorType::NotPalm)
    });
    let message = reply
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);
    let details = reply
        .get("details")
        .cloned()
        .and_then(|details| serde_json::from_value::<ValidationDetails>(details).ok());

    Ok(ValidationOutcome {
        is_valid,
        error_type,
        message,
        details,
    })
}

fn base_log(analysis_id: &str, template: &PromptTemplate) -> PromptLog {
    PromptLog::new(
        analysis_id,
        PromptLogKind::PalmValidation,
        PromptText {
            system: template.system.clone(),
            user: template.user.clone(),
        },
        PromptMetadata {
            model: MODEL.to_string(),
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
            image_detail: Some(IMAGE_DETAIL.to_string()),
            prompt_length: template.prompt_length(),
        },
    )
}
