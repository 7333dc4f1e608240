//! Test helpers: an in-process app over the memory backend and a fake
//! OpenAI-compatible provider it talks to.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::multipart;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;

use palm_job::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::store::{KvBackend, MemoryBackend},
};

use crate::fixtures;

/// What the fake provider answers to one kind of chat request.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Answer with the text after holding the request open.
    Delayed(Duration, String),
    Fail(u16),
}

impl Reply {
    pub fn text(content: &str) -> Self {
        Reply::Text(content.to_string())
    }
}

/// What the fake provider answers to an image generation request.
#[derive(Debug, Clone)]
pub enum ImageReply {
    /// Points at the fake provider's own `/files/card.png`.
    Card,
    /// Same as `Card`, after holding the request open.
    DelayedCard(Duration),
    Fail(u16),
}

#[derive(Debug, Clone)]
pub struct ProviderScript {
    pub validation: Reply,
    pub analysis: Reply,
    pub image: ImageReply,
}

impl ProviderScript {
    /// Every step succeeds.
    pub fn happy() -> Self {
        Self {
            validation: Reply::text(fixtures::VALID_PALMS),
            analysis: Reply::text(fixtures::STAR_CARTOGRAPHER),
            image: ImageReply::Card,
        }
    }
}

#[derive(Debug, Default)]
pub struct ProviderCalls {
    pub validation: AtomicUsize,
    pub analysis: AtomicUsize,
    pub images: AtomicUsize,
    pub downloads: AtomicUsize,
    pub image_prompts: Mutex<Vec<String>>,
}

impl ProviderCalls {
    pub fn validation(&self) -> usize {
        self.validation.load(Ordering::SeqCst)
    }

    pub fn analysis(&self) -> usize {
        self.analysis.load(Ordering::SeqCst)
    }

    pub fn images(&self) -> usize {
        self.images.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_prompts.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct ProviderState {
    script: ProviderScript,
    calls: Arc<ProviderCalls>,
    base_url: String,
}

pub struct FakeProvider {
    /// Value for `OPENAI_BASE_URL`.
    pub api_base: String,
    pub calls: Arc<ProviderCalls>,
}

// Validation and analysis share the endpoint; the token budget tells them apart.
const VALIDATION_MAX_TOKENS: u64 = 200;

async fn chat_completions(
    State(provider): State<ProviderState>,
    Json(body): Json<Value>,
) -> Response {
    let reply = if body["max_tokens"].as_u64() == Some(VALIDATION_MAX_TOKENS) {
        provider.calls.validation.fetch_add(1, Ordering::SeqCst);
        provider.script.validation
    } else {
        provider.calls.analysis.fetch_add(1, Ordering::SeqCst);
        provider.script.analysis
    };

    match reply {
        Reply::Text(content) => chat_reply(content),
        Reply::Delayed(delay, content) => {
            sleep(delay).await;
            chat_reply(content)
        }
        Reply::Fail(status) => provider_error(status),
    }
}

fn chat_reply(content: String) -> Response {
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
    .into_response()
}

async fn image_generations(
    State(provider): State<ProviderState>,
    Json(body): Json<Value>,
) -> Response {
    provider.calls.images.fetch_add(1, Ordering::SeqCst);
    if let Some(prompt) = body["prompt"].as_str() {
        provider
            .calls
            .image_prompts
            .lock()
            .unwrap()
            .push(prompt.to_string());
    }

    let card = || {
        Json(json!({
            "data": [{"url": format!("{}/files/card.png", provider.base_url)}]
        }))
        .into_response()
    };
    match provider.script.image {
        ImageReply::Card => card(),
        ImageReply::DelayedCard(delay) => {
            sleep(delay).await;
            card()
        }
        ImageReply::Fail(status) => provider_error(status),
    }
}

async fn card_file(State(provider): State<ProviderState>) -> Response {
    provider.calls.downloads.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], fixtures::card_bytes()).into_response()
}

fn provider_error(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap();
    (
        status,
        Json(json!({"error": {"message": "fake provider failure"}})),
    )
        .into_response()
}

/// Start a fake provider on an ephemeral port.
pub async fn spawn_provider(script: ProviderScript) -> FakeProvider {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let calls = Arc::new(ProviderCalls::default());

    let state = ProviderState {
        script,
        calls: calls.clone(),
        base_url: base_url.clone(),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/images/generations", post(image_generations))
        .route("/files/card.png", get(card_file))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeProvider {
        api_base: format!("{base_url}/v1"),
        calls,
    }
}

/// Config pointing at `provider`, with the shipped prompt files.
pub fn test_config(provider: &FakeProvider) -> AppConfig {
    AppConfig {
        openai_api_key: Some("test-key".to_string()),
        openai_base_url: provider.api_base.clone(),
        prompt_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("prompts"),
        http_timeout_secs: 10,
        ..AppConfig::default()
    }
}

pub struct TestApp {
    pub base_url: String,
    pub backend: Arc<MemoryBackend>,
    pub client: reqwest::Client,
}

/// Serve the API router on an ephemeral port. `public_base_url` is set to
/// the bound address so stored card links resolve against this app.
pub async fn spawn_app(mut config: AppConfig) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    config.public_base_url = base_url.clone();

    let backend = Arc::new(MemoryBackend::new());
    let kv: Arc<dyn KvBackend> = backend.clone();
    let state = AppState::new(&config, kv).unwrap();
    let app = routes::build_router(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url,
        backend,
        client: reqwest::Client::new(),
    }
}

fn image_part(bytes: Vec<u8>, filename: &str) -> multipart::Part {
    multipart::Part::bytes(bytes).file_name(filename.to_string())
}

impl TestApp {
    /// POST /api/analyze with whichever fields are given.
    pub async fn submit(
        &self,
        left: Option<Vec<u8>>,
        right: Option<Vec<u8>>,
        gender: Option<&str>,
    ) -> reqwest::Response {
        let mut form = multipart::Form::new();
        if let Some(bytes) = left {
            form = form.part("leftImage", image_part(bytes, "left.png"));
        }
        if let Some(bytes) = right {
            form = form.part("rightImage", image_part(bytes, "right.png"));
        }
        if let Some(g) = gender {
            form = form.text("gender", g.to_string());
        }

        self.client
            .post(format!("{}/api/analyze", self.base_url))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    /// Submit a valid pair and return the new analysis id.
    pub async fn submit_palms(&self, gender: Option<&str>) -> String {
        let response = self
            .submit(
                Some(fixtures::png_bytes()),
                Some(fixtures::jpeg_bytes()),
                gender,
            )
            .await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "pending");
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn get_result(&self, id: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/api/result/{}", self.base_url, id))
            .send()
            .await
            .unwrap()
    }

    /// Poll until the record is completed or failed.
    pub async fn poll_until_terminal(&self, id: &str) -> Value {
        for _ in 0..200 {
            let response = self.get_result(id).await;
            assert_eq!(response.status(), 200);
            let record: Value = response.json().await.unwrap();
            if record["status"] == "completed" || record["status"] == "failed" {
                return record;
            }
            sleep(Duration::from_millis(25)).await;
        }
        panic!("analysis {id} did not reach a terminal state");
    }

    /// Poll until the record reports `progress`, returning that snapshot.
    /// Panics if the run reaches a terminal state first.
    pub async fn wait_for_progress(&self, id: &str, progress: u64) -> Value {
        for _ in 0..200 {
            let record: Value = self.get_result(id).await.json().await.unwrap();
            if record["progress"] == progress {
                return record;
            }
            assert!(
                record["status"] != "completed" && record["status"] != "failed",
                "run finished before reaching progress {progress}: {record}"
            );
            sleep(Duration::from_millis(10)).await;
        }
        panic!("analysis {id} never reported progress {progress}");
    }

    /// Wait for detached prompt-log writes to land.
    pub async fn wait_for_keys(&self, prefix: &str, expected: usize) -> Vec<String> {
        for _ in 0..100 {
            let keys = self.backend.keys_with_prefix(prefix).await;
            if keys.len() >= expected {
                return keys;
            }
            sleep(Duration::from_millis(20)).await;
        }
        self.backend.keys_with_prefix(prefix).await
    }
}
