use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Reasons an uploaded palm pair is rejected before analysis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadErrorType {
    NotPalm,
    PalmCropped,
    TooDark,
    TooBlurry,
    HandMismatch,
    GenerationFailed,
    Unknown,
}

impl UploadErrorType {
    pub fn user_message(self) -> &'static str {
        match self {
            UploadErrorType::NotPalm => "Please upload a photo of your palm.",
            UploadErrorType::PalmCropped => "Please take a photo showing your whole palm.",
            UploadErrorType::TooDark => "Please retake the photo in a brighter place.",
            UploadErrorType::TooBlurry => "Please retake a sharper photo.",
            UploadErrorType::HandMismatch => {
                "This looks like a different hand than selected. Please check and upload again."
            }
            UploadErrorType::GenerationFailed => {
                "We couldn't generate your result right now. Please upload again."
            }
            UploadErrorType::Unknown => "Something went wrong. Please try again.",
        }
    }

    /// Lenient parse of a model-supplied code; anything unrecognised is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        code.trim().parse().unwrap_or(UploadErrorType::Unknown)
    }
}

/// Per-check flags reported by the validation model. Diagnostic only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationDetails {
    pub is_palm: Option<bool>,
    pub is_left_hand: Option<bool>,
    pub is_right_hand: Option<bool>,
    pub is_complete: Option<bool>,
    pub is_bright: Option<bool>,
    pub is_clear: Option<bool>,
    pub has_palm_lines: Option<bool>,
}

/// Accept/reject decision for an image pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<UploadErrorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationDetails>,
}

impl ValidationOutcome {
    pub fn accepted(message: Option<String>) -> Self {
        Self {
            is_valid: true,
            error_type: None,
            message,
            details: None,
        }
    }

    pub fn rejected(error_type: UploadErrorType, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_type: Some(error_type),
            message: Some(message.into()),
            details: None,
        }
    }

    /// The reason to record when this outcome rejects the upload.
    pub fn rejection(&self) -> Option<UploadErrorType> {
        if self.is_valid {
            None
        } else {
            Some(self.error_type.unwrap_or(UploadErrorType::NotPalm))
        }
    }
}
