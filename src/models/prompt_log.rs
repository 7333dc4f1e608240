use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which provider call a log entry describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PromptLogKind {
    PalmValidation,
    PalmAnalysis,
    JobIllustration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptText {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub raw_response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetadata {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_detail: Option<String>,
    pub prompt_length: usize,
}

/// Diagnostic record of one provider request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptLog {
    pub id: String,
    pub analysis_id: String,
    #[serde(rename = "type")]
    pub kind: PromptLogKind,
    pub prompt: PromptText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<PromptResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: PromptMetadata,
    pub timestamp: DateTime<Utc>,
}

impl PromptLog {
    pub fn new(
        analysis_id: &str,
        kind: PromptLogKind,
        prompt: PromptText,
        metadata: PromptMetadata,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            id: format!("{analysis_id}:{kind}:{}", timestamp.timestamp_millis()),
            analysis_id: analysis_id.to_string(),
            kind,
            prompt,
            response: None,
            error: None,
            metadata,
            timestamp,
        }
    }

    pub fn with_response(mut self, response: PromptResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
