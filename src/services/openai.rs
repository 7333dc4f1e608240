use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::services::json_extract::ExtractError;

/// Client for an OpenAI-compatible API: vision chat completions, image
/// generation and plain image downloads.
pub struct OpenAiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
}

/// A chat completion over a left/right palm image pair.
pub struct VisionChat<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub images: [&'a str; 2],
    pub image_detail: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

pub struct ImageGeneration<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub size: &'a str,
    pub quality: &'a str,
    pub style: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ChatMessage<'a> {
    System { content: &'a str },
    User { content: Vec<ContentPart<'a>> },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
    detail: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
    style: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, AiError> {
        self.api_key.as_deref().ok_or(AiError::MissingApiKey)
    }

    /// Run a vision chat completion and return the assistant's text.
    pub async fn chat_with_images(&self, chat: &VisionChat<'_>) -> Result<String, AiError> {
        let api_key = self.api_key()?;
        let [left, right] = chat.images;

        let request_body = ChatRequest {
            model: chat.model,
            messages: vec![
                ChatMessage::System {
                    content: chat.system,
                },
                ChatMessage::User {
                    content: vec![
                        ContentPart::Text { text: chat.user },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: left,
                                detail: chat.image_detail,
                            },
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: right,
                                detail: chat.image_detail,
                            },
                        },
                    ],
                },
            ],
            max_tokens: chat.max_tokens,
            temperature: chat.temperature,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let chat_resp: ChatResponse = response.json().await?;
        chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AiError::EmptyContent)
    }

    /// Generate one image and return the provider's (short-lived) URL.
    pub async fn generate_image(&self, request: &ImageGeneration<'_>) -> Result<String, AiError> {
        let api_key = self.api_key()?;

        let request_body = ImageRequest {
            model: request.model,
            prompt: request.prompt,
            n: 1,
            size: request.size,
            quality: request.quality,
            style: request.style,
        };

        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let image_resp: ImageResponse = response.json().await?;
        image_resp
            .data
            .into_iter()
            .next()
            .and_then(|data| data.url)
            .ok_or(AiError::MissingImageUrl)
    }

    /// Fetch the bytes behind a generated image URL.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, AiError> {
        let response = self.http.get(url).send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(AiError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model returned empty content")]
    EmptyContent,

    #[error("Image generation returned no URL")]
    MissingImageUrl,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Model response failed validation: {0}")]
    Invalid(String),
}
