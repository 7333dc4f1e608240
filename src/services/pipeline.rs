//! Background analysis run for one record:
//!
//! `pending → analyzing(0) → [validation] → analyzing(30) → [analysis]
//! → analyzing(70) → [illustration] → completed(100)`
//!
//! Only a validation rejection ends in `failed`. Once validation accepts,
//! analysis and illustration problems are papered over (fallback job, no
//! card image) and the record always completes.

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::analysis::{AnalysisStatus, JobResult, RecordPatch};
use crate::models::intake::Gender;
use crate::models::validation::UploadErrorType;
use crate::services::diagnostics::PromptLogger;
use crate::services::illustration::JobIllustrator;
use crate::services::images::{self, UploadedImage};
use crate::services::palm_analysis::{self, JobAnalyzer};
use crate::services::palm_validation::PalmValidator;
use crate::services::store::{BlobKind, ResultStore, StoreError};

pub const PROGRESS_STARTED: u8 = 0;
pub const PROGRESS_VALIDATED: u8 = 30;
pub const PROGRESS_ANALYZED: u8 = 70;

/// Everything a run needs from the intake request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub id: String,
    pub left: UploadedImage,
    pub right: UploadedImage,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Copy generated card images into the store.
    pub durable_images: bool,
    /// Write provider prompts/responses to the diagnostic log namespace.
    pub prompt_logs: bool,
    /// Prefix for links to stored images.
    pub public_base_url: String,
}

/// The analysis orchestrator. Cheap to clone; one clone per run.
#[derive(Clone)]
pub struct AnalysisPipeline {
    store: ResultStore,
    validator: Arc<PalmValidator>,
    analyzer: Arc<JobAnalyzer>,
    illustrator: Arc<JobIllustrator>,
    options: Arc<PipelineOptions>,
}

impl AnalysisPipeline {
    pub fn new(
        store: ResultStore,
        validator: PalmValidator,
        analyzer: JobAnalyzer,
        illustrator: JobIllustrator,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            validator: Arc::new(validator),
            analyzer: Arc::new(analyzer),
            illustrator: Arc::new(illustrator),
            options: Arc::new(options),
        }
    }

    /// Start a run on a detached task. The caller does not wait for it and
    /// the run cannot be cancelled; its errors are logged here.
    pub fn spawn(&self, request: AnalysisRequest) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let id = request.id.clone();
            let start = Instant::now();
            match pipeline.run(request).await {
                Ok(status) => {
                    metrics::histogram!("analysis_duration_seconds")
                        .record(start.elapsed().as_secs_f64());
                    info!(
                        analysis_id = %id,
                        status = %status,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Analysis run finished"
                    );
                }
                Err(e) => {
                    metrics::counter!("analysis_runs_aborted_total").increment(1);
                    error!(analysis_id = %id, error = %e, "Analysis run aborted");
                }
            }
        })
    }

    /// Execute one run to its terminal state.
    pub async fn run(&self, request: AnalysisRequest) -> Result<AnalysisStatus, PipelineError> {
        let id = request.id.as_str();
        let logger = if self.options.prompt_logs {
            PromptLogger::new(self.store.clone())
        } else {
            PromptLogger::disabled()
        };

        self.advance(id, RecordPatch::analyzing(PROGRESS_STARTED)).await?;

        let encoded = match images::encode_pair(&request.left, &request.right).await {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(analysis_id = %id, error = %e, "Image encoding task failed");
                return self.complete_with_fallback(id).await;
            }
        };

        // ── Validation (cheap gate) ──────────────────────────────────────
        let outcome = self.validator.validate(id, &encoded, &logger).await;
        if let Some(reason) = outcome.rejection() {
            info!(analysis_id = %id, reason = %reason, "Palm images rejected");
            return self.fail(id, reason).await;
        }
        self.advance(id, RecordPatch::analyzing(PROGRESS_VALIDATED)).await?;

        // ── Analysis (fallback on any failure) ───────────────────────────
        let analysis = self.analyzer.analyze(id, &encoded, &logger).await;
        drop(encoded);
        let (mut job, analyzed) = match analysis {
            Ok(job) => (job, true),
            Err(e) => {
                warn!(analysis_id = %id, error = %e, "Using fallback job");
                (self.fallback_job(), false)
            }
        };
        self.advance(id, RecordPatch::analyzing(PROGRESS_ANALYZED)).await?;

        // ── Illustration (best effort) ───────────────────────────────────
        if analyzed {
            match self
                .illustrator
                .illustrate(id, &job.title, request.gender, &logger)
                .await
            {
                Ok(url) => {
                    job.card_image_url = Some(self.persist_card(id, url).await);
                    info!(analysis_id = %id, title = %job.title, "Card image attached");
                }
                Err(_) => {
                    info!(analysis_id = %id, "Continuing without card image");
                }
            }
        }

        self.complete(id, job).await
    }

    async fn advance(&self, id: &str, patch: RecordPatch) -> Result<(), PipelineError> {
        match self.store.update(id, patch).await? {
            Some(_) => Ok(()),
            None => Err(PipelineError::RecordMissing(id.to_string())),
        }
    }

    async fn fail(&self, id: &str, reason: UploadErrorType) -> Result<AnalysisStatus, PipelineError> {
        self.advance(id, RecordPatch::failed(reason)).await?;
        metrics::counter!("analysis_failed_total", "reason" => reason.to_string()).increment(1);
        Ok(AnalysisStatus::Failed)
    }

    fn fallback_job(&self) -> JobResult {
        metrics::counter!("analysis_fallback_total").increment(1);
        palm_analysis::fallback_job()
    }

    /// Finish a run that cannot reach the provider with a canned job.
    async fn complete_with_fallback(&self, id: &str) -> Result<AnalysisStatus, PipelineError> {
        let job = self.fallback_job();
        self.complete(id, job).await
    }

    async fn complete(&self, id: &str, job: JobResult) -> Result<AnalysisStatus, PipelineError> {
        self.advance(id, RecordPatch::completed(job)).await?;
        metrics::counter!("analysis_completed_total").increment(1);
        Ok(AnalysisStatus::Completed)
    }

    /// Keep a copy of the card image, since provider URLs expire. Returns
    /// the URL to publish: ours on success, the provider's otherwise.
    async fn persist_card(&self, id: &str, provider_url: String) -> String {
        if !self.options.durable_images {
            return provider_url;
        }

        let bytes = match self.illustrator.fetch(&provider_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(analysis_id = %id, error = %e, "Failed to download card image");
                return provider_url;
            }
        };

        if images::sniff_format(&bytes).is_none() {
            warn!(analysis_id = %id, "Downloaded card is not a recognised image");
            return provider_url;
        }

        match self.store.store_blob(id, BlobKind::Card, &bytes).await {
            Ok(()) => format!(
                "{}/api/image/{}/{}",
                self.options.public_base_url.trim_end_matches('/'),
                id,
                BlobKind::Card
            ),
            Err(e) => {
                warn!(analysis_id = %id, error = %e, "Failed to store card image");
                provider_url
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Record {0} disappeared during analysis")]
    RecordMissing(String),
}
