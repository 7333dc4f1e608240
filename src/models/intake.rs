use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::analysis::AnalysisStatus;

/// Optional character hint for the illustration step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Response after submitting a palm pair for analysis.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub id: String,
    pub status: AnalysisStatus,
}
