use tracing::warn;

use crate::models::prompt_log::PromptLog;
use crate::services::store::ResultStore;

/// Fire-and-forget sink for provider prompt logs. A failed write is logged
/// and otherwise ignored.
#[derive(Clone)]
pub struct PromptLogger {
    store: Option<ResultStore>,
}

impl PromptLogger {
    pub fn new(store: ResultStore) -> Self {
        Self { store: Some(store) }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn record(&self, log: PromptLog) {
        let Some(store) = self.store.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = store.append_log(&log).await {
                warn!(analysis_id = %log.analysis_id, kind = %log.kind, error = %e, "Failed to save prompt log");
            }
        });
    }
}
