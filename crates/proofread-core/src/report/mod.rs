pub mod json;
pub mod progress;
pub mod summary;

use crate::model::Scenario;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bookkeeping for one orchestration run. Not part of the manifest schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Experiments that ran in this mode, in registration order.
    pub experiments: Vec<String>,
    /// Scenarios (translation mode) or analyses (analysis mode) scored.
    pub subjects: usize,
    /// Experiment invocations that completed.
    pub invocations: usize,
    pub results: usize,
    /// Results carrying no score.
    pub failed: usize,
    pub skipped_documents: Vec<String>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            experiments: Vec::new(),
            subjects: 0,
            invocations: 0,
            results: 0,
            failed: 0,
            skipped_documents: Vec::new(),
            cancelled: false,
        }
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Output of a translation-matrix run: the scored scenarios plus the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifacts {
    pub report: RunReport,
    pub scenarios: Vec<Scenario>,
}
