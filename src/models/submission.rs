//! Submission intake models.

use serde::{Deserialize, Serialize};

/// Request body for creating a new submission.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmissionRequest {
    pub context_id: String,
    #[serde(default)]
    pub receivers: Vec<String>,
    /// Answers keyed by field id
    #[serde(default)]
    pub answers: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub finalize: bool,
}

/// The internal tip created for a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub id: String,
    pub context_id: String,
    pub progressive: i64,
    pub receivers: Vec<String>,
    pub creation_date: String,
    pub expiration_date: String,
    pub finalized: bool,
}
