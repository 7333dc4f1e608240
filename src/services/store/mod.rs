//! Result store: analysis records, card image blobs and diagnostic prompt
//! logs, all kept in a TTL key-value store under separate key prefixes.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, EnumString};

use crate::models::analysis::{AnalysisRecord, InvalidTransition, RecordPatch};
use crate::models::prompt_log::PromptLog;

mod memory;
mod redis_backend;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

const RECORD_PREFIX: &str = "palmjob:result:";
const IMAGE_PREFIX: &str = "palmjob:image:";
const LOG_PREFIX: &str = "palmjob:log:";

/// Minimal get/set-with-expiry surface the result store needs.
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set_ex(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), StoreError>;

    /// Remaining lifetime in whole seconds, `None` when the key is missing
    /// or carries no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<u64>, StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Binary payloads stored next to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum BlobKind {
    Card,
}

pub fn record_key(id: &str) -> String {
    format!("{RECORD_PREFIX}{id}")
}

pub fn blob_key(id: &str, kind: BlobKind) -> String {
    format!("{IMAGE_PREFIX}{id}:{kind}")
}

pub fn log_key(log: &PromptLog) -> String {
    format!(
        "{LOG_PREFIX}{}:{}:{}",
        log.analysis_id,
        log.kind,
        log.timestamp.timestamp_millis()
    )
}

/// Handle to the analysis record store. Cheap to clone.
#[derive(Clone)]
pub struct ResultStore {
    backend: Arc<dyn KvBackend>,
    ttl: Duration,
}

impl ResultStore {
    pub fn new(backend: Arc<dyn KvBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }

    /// Create a fresh `pending` record.
    pub async fn create(&self, id: &str) -> Result<AnalysisRecord, StoreError> {
        let record = AnalysisRecord::new(id, Utc::now(), self.ttl);
        let payload = serde_json::to_vec(&record)?;
        self.backend
            .set_ex(&record_key(id), &payload, self.ttl_secs())
            .await?;
        Ok(record)
    }

    /// Merge `patch` onto a stored record, keeping its remaining lifetime.
    /// Returns `None` when the record does not exist.
    pub async fn update(
        &self,
        id: &str,
        patch: RecordPatch,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        let key = record_key(id);
        let Some(raw) = self.backend.get(&key).await? else {
            return Ok(None);
        };

        let mut record: AnalysisRecord = serde_json::from_slice(&raw)?;
        record.apply(patch)?;

        let ttl_secs = match self.backend.ttl(&key).await? {
            Some(remaining) => remaining,
            None => self.ttl_secs(),
        };
        let payload = serde_json::to_vec(&record)?;
        self.backend.set_ex(&key, &payload, ttl_secs).await?;
        Ok(Some(record))
    }

    /// Fetch a record, treating anything past `expiresAt` as gone even if
    /// the backend has not evicted it yet.
    pub async fn read(&self, id: &str) -> Result<Option<AnalysisRecord>, StoreError> {
        let key = record_key(id);
        let Some(raw) = self.backend.get(&key).await? else {
            return Ok(None);
        };

        let record: AnalysisRecord = serde_json::from_slice(&raw)?;
        if record.is_expired_at(Utc::now()) {
            self.backend.del(&key).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub async fn store_blob(&self, id: &str, kind: BlobKind, bytes: &[u8]) -> Result<(), StoreError> {
        self.backend
            .set_ex(&blob_key(id, kind), bytes, self.ttl_secs())
            .await
    }

    pub async fn read_blob(&self, id: &str, kind: BlobKind) -> Result<Option<Vec<u8>>, StoreError> {
        self.backend.get(&blob_key(id, kind)).await
    }

    pub async fn append_log(&self, log: &PromptLog) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(log)?;
        self.backend
            .set_ex(&log_key(log), &payload, self.ttl_secs())
            .await
    }

    /// Check store connectivity (for health checks).
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.backend.ping().await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::{AnalysisStatus, JobResult};
    use crate::models::prompt_log::{PromptLogKind, PromptMetadata, PromptText};
    use crate::models::validation::UploadErrorType;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn store() -> (ResultStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (ResultStore::new(backend.clone(), 30 * DAY), backend)
    }

    fn sample_job() -> JobResult {
        JobResult {
            title: "Dream Interpreter".to_string(),
            short_comment: Some("Reads the night 🌙".to_string()),
            interpretation: "Your lines cross.\n\nYou read dreams.".to_string(),
            card_image_url: Some("https://img.example/card.png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let (store, _) = store();
        let created = store.create("r1").await.unwrap();
        let read = store.read("r1").await.unwrap().unwrap();
        assert_eq!(created, read);
        assert_eq!(read.status, AnalysisStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_noop() {
        let (store, backend) = store();
        let result = store.update("ghost", RecordPatch::analyzing(0)).await.unwrap();
        assert!(result.is_none());
        assert!(backend.keys_with_prefix(RECORD_PREFIX).await.is_empty());
    }

    #[tokio::test]
    async fn test_completed_job_round_trips() {
        let (store, _) = store();
        store.create("r2").await.unwrap();
        store.update("r2", RecordPatch::analyzing(0)).await.unwrap();
        store
            .update("r2", RecordPatch::completed(sample_job()))
            .await
            .unwrap();

        let read = store.read("r2").await.unwrap().unwrap();
        assert_eq!(read.status, AnalysisStatus::Completed);
        assert_eq!(read.job, Some(sample_job()));
    }

    #[tokio::test]
    async fn test_update_preserves_remaining_ttl() {
        let (store, backend) = store();
        let record = AnalysisRecord::new("r3", Utc::now(), 30 * DAY);
        backend
            .set_ex(&record_key("r3"), &serde_json::to_vec(&record).unwrap(), 50)
            .await
            .unwrap();

        store.update("r3", RecordPatch::analyzing(30)).await.unwrap();

        let remaining = backend.ttl(&record_key("r3")).await.unwrap().unwrap();
        assert!(remaining <= 50, "ttl was reset to {remaining}");
    }

    #[tokio::test]
    async fn test_read_past_expiry_deletes_record() {
        let (store, backend) = store();
        let mut record = AnalysisRecord::new("r4", Utc::now(), DAY);
        record.expires_at = Utc::now() - chrono::Duration::seconds(1);
        // Backend TTL still live: the store must not trust it.
        backend
            .set_ex(&record_key("r4"), &serde_json::to_vec(&record).unwrap(), 3600)
            .await
            .unwrap();

        assert!(store.read("r4").await.unwrap().is_none());
        assert!(backend.get(&record_key("r4")).await.unwrap().is_none());
        // Idempotent.
        assert!(store.read("r4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backward_update_is_rejected() {
        let (store, _) = store();
        store.create("r5").await.unwrap();
        store
            .update("r5", RecordPatch::failed(UploadErrorType::NotPalm))
            .await
            .unwrap();

        let err = store
            .update("r5", RecordPatch::analyzing(30))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transition(_)));
        let read = store.read("r5").await.unwrap().unwrap();
        assert_eq!(read.status, AnalysisStatus::Failed);
    }

    #[tokio::test]
    async fn test_blobs_and_logs_use_separate_namespaces() {
        let (store, backend) = store();
        store.create("r6").await.unwrap();
        store.store_blob("r6", BlobKind::Card, b"png").await.unwrap();

        let log = PromptLog::new(
            "r6",
            PromptLogKind::PalmAnalysis,
            PromptText {
                system: "sys".to_string(),
                user: "usr".to_string(),
            },
            PromptMetadata {
                model: "gpt-4o-mini".to_string(),
                temperature: Some(0.8),
                max_tokens: Some(600),
                image_detail: Some("low".to_string()),
                prompt_length: 6,
            },
        );
        store.append_log(&log).await.unwrap();

        assert_eq!(
            store.read_blob("r6", BlobKind::Card).await.unwrap(),
            Some(b"png".to_vec())
        );
        assert_eq!(backend.keys_with_prefix(RECORD_PREFIX).await, vec![record_key("r6")]);
        assert_eq!(backend.keys_with_prefix(IMAGE_PREFIX).await, vec!["palmjob:image:r6:card"]);
        let logs = backend.keys_with_prefix("palmjob:log:r6:palm_analysis:").await;
        assert_eq!(logs.len(), 1);
    }
}
