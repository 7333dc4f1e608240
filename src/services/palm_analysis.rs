//! Palm reading → whimsical job recommendation, plus the canned results
//! used when the model call does not produce one.

use garde::Validate;
use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::analysis::JobResult;
use crate::models::prompt_log::{PromptLog, PromptLogKind, PromptMetadata, PromptResponse, PromptText};
use crate::services::diagnostics::PromptLogger;
use crate::services::images::EncodedPair;
use crate::services::json_extract;
use crate::services::openai::{AiError, OpenAiClient, VisionChat};
use crate::services::prompts::{PromptSource, PromptTemplate};

pub const PROMPT_FILE: &str = "palm-analysis.prompt";

const MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 600;
const TEMPERATURE: f32 = 0.8;
const IMAGE_DETAIL: &str = "low";

const FALLBACK_SYSTEM_PROMPT: &str = r#"You are a playful and creative palm reader. Look at photos of both palms (left and right) and recommend a unique, unusual job that suits the person.

## Reading guide
Interpret the visible features creatively:
- **Life line**: energy, vitality, passion for life
- **Head line**: way of thinking, creativity, problem solving
- **Heart line**: sensitivity, relationships, empathy
- **Fate line**: career, direction in life, sense of purpose
- **Hand shape**: finger length, palm size, overall proportions

## Reading both hands
- **Left hand**: innate potential, inner talents, unconscious tendencies
- **Right hand**: abilities already expressed, conscious effort, realised traits
- Compare the **differences** and **similarities** between the hands for a deeper reading

## Rules
1. Mention real features of the lines (depth, length, branches) in the reading
2. Keep a humorous, positive tone
3. Never say anything hurtful
4. Recommend a **different and unusual** job every time (inventing new ones is encouraged)
5. Make the reading feel specific and personal

## Example jobs (for inspiration only)
Space debris collector, emotion proxy, sleep tester, AI trainer, futurist, digital undertaker, cloud watcher, board game designer, plant whisperer, time coach, luck courier, dream interpreter, laughter therapist, colour consultant, keeper of secrets, mood curator, idea harvester, scent architect, memory organiser, wind musician, starlight collector, rainbow hunter

## Response format (JSON only)
{
  "title": "Job title (2-4 words)",
  "shortComment": "One-line comment with exactly one emoji",
  "interpretation": "Reading in two paragraphs of 2-3 sentences each"
}

## Interpretation guide
- Paragraph 1: analyse concrete features of both palms
- Paragraph 2: explain why this job fits, based on the analysis
- Finish on a warm, encouraging note"#;

const FALLBACK_USER_PROMPT: &str = r#"Look at these two palm photos (left and right) together and recommend an unusual job that suits this person.
The first image is the left hand, the second image is the right hand.
Combine the lines of both hands in your reading. Respond in JSON only."#;

/// Analysis client backed by a vision chat model.
pub struct JobAnalyzer {
    ai: Arc<OpenAiClient>,
    prompts: PromptSource,
}

impl JobAnalyzer {
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

    /// Ask the model for a job recommendation. Any failure is returned to
    /// the caller, which substitutes a [`fallback_job`].
    pub async fn analyze(
        &self,
        analysis_id: &str,
        images: &EncodedPair,
        logger: &PromptLogger,
    ) -> Result<JobResult, AiError> {
        if !self.ai.is_configured() {
            return Err(AiError::MissingApiKey);
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
                error!(analysis_id, error = %e, "Palm analysis request failed");
                logger.record(base_log(analysis_id, template).with_error(e.to_string()));
                return Err(e);
            }
        };

        let job = match parse_job(&content) {
            Ok(job) => job,
            Err(e) => {
                logger.record(
                    base_log(analysis_id, template)
                        .with_response(PromptResponse {
                            raw_response: content,
                            ..PromptResponse::default()
                        })
                        .with_error(e.to_string()),
                );
                return Err(e);
            }
        };

        logger.record(base_log(analysis_id, template).with_response(PromptResponse {
            title: Some(job.title.clone()),
            short_comment: job.short_comment.clone(),
            interpretation: Some(job.interpretation.clone()),
            image_url: None,
            raw_response: content,
        }));

        info!(analysis_id, title = %job.title, "Palm analysis complete");
        Ok(job)
    }
}

fn parse_job(content: &str) -> Result<JobResult, AiError> {
    let mut job: JobResult = json_extract::extract_object(content)?;
    job.title = job.title.trim().to_string();
    job.interpretation = job.interpretation.trim().to_string();
    job.card_image_url = None;
    job.validate()
        .map_err(|report| AiError::Invalid(report.to_string()))?;
    Ok(job)
}

fn base_log(analysis_id: &str, template: &PromptTemplate) -> PromptLog {
    PromptLog::new(
        analysis_id,
        PromptLogKind::PalmAnalysis,
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

/// The fixed set of canned results.
pub fn fallback_jobs() -> [JobResult; 3] {
    [
        JobResult {
            title: "Luck Courier".to_string(),
            short_comment: Some("Delivers good fortune 🍀".to_string()),
            interpretation: "Both of your palms are full of bright energy. Your left hand shows an inborn optimism, and your right hand shows the effort you put into lighting up the people around you.\n\nA job delivering luck to others suits you perfectly. Good things will happen wherever you go!".to_string(),
            card_image_url: None,
        },
        JobResult {
            title: "Dream Interpreter".to_string(),
            short_comment: Some("Reads the stories of the night 🌙".to_string()),
            interpretation: "The intuition line on your left hand is clear, and lines of imagination cross on your right. You are connected to the world of the unconscious.\n\nInterpreting people's dreams and finding their meaning is the job for you. Turn the stories of the night into wisdom for the day!".to_string(),
            card_image_url: None,
        },
        JobResult {
            title: "Mood Curator".to_string(),
            short_comment: Some("Tidies up hearts 💝".to_string()),
            interpretation: "Your left hand shows a delicate sensitivity and your right hand a gift for expression. Together they strike a beautiful balance.\n\nYou have a talent for gathering people's feelings and curating them with care. Become someone who collects and shares the world's emotions!".to_string(),
            card_image_url: None,
        },
    ]
}

/// One of the canned results, picked at random.
pub fn fallback_job() -> JobResult {
    let jobs = fallback_jobs();
    let mut rng = rand::thread_rng();
    jobs.choose(&mut rng).cloned().unwrap_or_else(|| jobs[0].clone())
}
