use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

use crate::models::validation::UploadErrorType;

/// Lifecycle of an analysis record. Only moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            AnalysisStatus::Pending => 0,
            AnalysisStatus::Analyzing => 1,
            AnalysisStatus::Completed | AnalysisStatus::Failed => 2,
        }
    }

    /// Whether a record in this status may be rewritten with `next`.
    pub fn can_advance_to(self, next: AnalysisStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

/// Job recommendation produced by the analysis step (or a fallback).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    #[garde(length(min = 1, max = 100))]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub short_comment: Option<String>,

    #[garde(length(min = 1))]
    pub interpretation: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub card_image_url: Option<String>,
}

/// Persisted state of one analysis request, as returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UploadErrorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            id: id.into(),
            status: AnalysisStatus::Pending,
            progress: None,
            job: None,
            error: None,
            error_message: None,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Merge a patch onto the record, refusing backward status moves.
    pub fn apply(&mut self, patch: RecordPatch) -> Result<(), InvalidTransition> {
        if let Some(next) = patch.status {
            if !self.status.can_advance_to(next) {
                return Err(InvalidTransition {
                    from: self.status,
                    to: next,
                });
            }
            self.status = next;
        }
        if let Some(progress) = patch.progress {
            self.progress = Some(progress.min(100));
        }
        if let Some(job) = patch.job {
            self.job = Some(job);
        }
        if let Some(error) = patch.error {
            self.error_message = Some(error.user_message().to_string());
            self.error = Some(error);
        }
        Ok(())
    }
}

/// Partial update applied by [`crate::services::store::ResultStore::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub status: Option<AnalysisStatus>,
    pub progress: Option<u8>,
    pub job: Option<JobResult>,
    pub error: Option<UploadErrorType>,
}

impl RecordPatch {
    pub fn analyzing(progress: u8) -> Self {
        Self {
            status: Some(AnalysisStatus::Analyzing),
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed(job: JobResult) -> Self {
        Self {
            status: Some(AnalysisStatus::Completed),
            progress: Some(100),
            job: Some(job),
            ..Self::default()
        }
    }

    /// Terminal failure. Progress is left where the run stopped.
    pub fn failed(error: UploadErrorType) -> Self {
        Self {
            status: Some(AnalysisStatus::Failed),
            error: Some(error),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: AnalysisStatus,
    pub to: AnalysisStatus,
}
