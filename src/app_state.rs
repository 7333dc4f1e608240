use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    illustration::JobIllustrator,
    openai::{AiError, OpenAiClient},
    palm_analysis::JobAnalyzer,
    palm_validation::PalmValidator,
    pipeline::{AnalysisPipeline, PipelineOptions},
    store::{KvBackend, ResultStore},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: ResultStore,
    pub pipeline: AnalysisPipeline,
    pub max_image_bytes: usize,
}

impl AppState {
    /// Wire the store handle and provider clients together. The backend is
    /// owned by the caller's startup code and injected here.
    pub fn new(config: &AppConfig, backend: Arc<dyn KvBackend>) -> Result<Self, AiError> {
        let store = ResultStore::new(backend, config.record_ttl());

        let ai = Arc::new(OpenAiClient::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            config.http_timeout(),
        )?);

        let pipeline = AnalysisPipeline::new(
            store.clone(),
            PalmValidator::new(ai.clone(), &config.prompt_dir),
            JobAnalyzer::new(ai.clone(), &config.prompt_dir),
            JobIllustrator::new(ai),
            PipelineOptions {
                durable_images: config.enable_image_storage,
                prompt_logs: config.enable_prompt_logs,
                public_base_url: config.public_base_url.clone(),
            },
        );

        Ok(Self {
            store,
            pipeline,
            max_image_bytes: config.max_image_bytes,
        })
    }
}
