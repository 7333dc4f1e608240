use std::sync::Arc;
use tracing::{info, warn};

use crate::models::intake::Gender;
use crate::models::prompt_log::{PromptLog, PromptLogKind, PromptMetadata, PromptResponse, PromptText};
use crate::services::diagnostics::PromptLogger;
use crate::services::openai::{AiError, ImageGeneration, OpenAiClient};

const MODEL: &str = "dall-e-3";
const SIZE: &str = "1024x1024";
const QUALITY: &str = "standard";
const STYLE: &str = "vivid";

const PROMPT_TEMPLATE: &str = r#"Create a magical and whimsical 3D character illustration for "{JOB_TITLE}".

Visual Style:
- Pixar/Disney-inspired 3D character design
- Soft, dreamy lighting with magical glow effects
- Purple-to-pink gradient background with subtle sparkles
- Palm line patterns subtly integrated into the background as decorative elements
- Square composition (1:1 ratio)

Character Design:
- Friendly, approachable character with warm expression
- Wearing stylized outfit or uniform that represents the job
- Holding or surrounded by symbolic tools/objects of the profession
- Slight floating or magical pose to convey whimsy
- Big expressive eyes with a gentle smile

Atmosphere:
- Mystical and enchanting mood
- Soft particle effects like stars or floating lights
- Clean, professional quality suitable for social media cards
- No text or letters in the image

The character should embody the essence of "{JOB_TITLE}" in a creative, fantastical way that feels both unique and universally appealing."#;

/// Image prompt for a job title, with an optional character hint.
pub fn build_prompt(job_title: &str, gender: Option<Gender>) -> String {
    let mut prompt = PROMPT_TEMPLATE.replace("{JOB_TITLE}", job_title);
    if let Some(gender) = gender {
        let character = match gender {
            Gender::Male => "a man",
            Gender::Female => "a woman",
        };
        prompt.push_str(&format!("\n\nThe character is {character}."));
    }
    prompt
}

/// Illustration client backed by an image generation model.
pub struct JobIllustrator {
    ai: Arc<OpenAiClient>,
}

impl JobIllustrator {
    pub fn new(ai: Arc<OpenAiClient>) -> Self {
        Self { ai }
    }

    /// Generate a character card and return the provider's image URL.
    pub async fn illustrate(
        &self,
        analysis_id: &str,
        job_title: &str,
        gender: Option<Gender>,
        logger: &PromptLogger,
    ) -> Result<String, AiError> {
        let prompt = build_prompt(job_title, gender);
        info!(analysis_id, job_title, "Generating card image");

        let result = self
            .ai
            .generate_image(&ImageGeneration {
                model: MODEL,
                prompt: &prompt,
                size: SIZE,
                quality: QUALITY,
                style: STYLE,
            })
            .await;

        let log = PromptLog::new(
            analysis_id,
            PromptLogKind::JobIllustration,
            PromptText {
                system: String::new(),
                user: prompt.clone(),
            },
            PromptMetadata {
                model: MODEL.to_string(),
                temperature: None,
                max_tokens: None,
                image_detail: None,
                prompt_length: prompt.chars().count(),
            },
        );

        match result {
            Ok(url) => {
                logger.record(log.with_response(PromptResponse {
                    image_url: Some(url.clone()),
                    raw_response: url.clone(),
                    ..PromptResponse::default()
                }));
                Ok(url)
            }
            Err(e) => {
                warn!(analysis_id, error = %e, "Card image generation failed");
                if !matches!(e, AiError::MissingApiKey) {
                    logger.record(log.with_error(e.to_string()));
                }
                Err(e)
            }
        }
    }

    /// Download generated image bytes for a durable copy.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, AiError> {
        self.ai.download(url).await
    }
}
