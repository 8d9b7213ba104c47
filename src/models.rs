use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A CI/CD plan as seen by the rest of the pipeline, after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelinePlan {
    pub key: String,
    pub name: String,
    pub enabled: bool,
    pub is_building: bool,
    pub average_build_time_in_seconds: u64,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failed,
    InProgress,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::InProgress => "IN_PROGRESS",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub step: String,
    pub message: String,
}

/// One step of a run, as reported by the CI server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub status: RunStatus,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub output: String,
}

/// A single execution of a pipeline.
///
/// Runs for a plan are ordered newest first, so the first run is the plan's
/// latest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub status: RunStatus,
    pub duration_seconds: u64,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
}

impl PipelineRun {
    /// Minimal run with only the required fields set.
    pub fn new(run_id: impl Into<String>, status: RunStatus, duration_seconds: u64) -> Self {
        Self {
            run_id: run_id.into(),
            status,
            duration_seconds,
            errors: Vec::new(),
            build_number: None,
            started_at: None,
            completed_at: None,
            triggered_by: None,
            branch: None,
            commit_hash: None,
            steps: Vec::new(),
        }
    }

    pub fn with_error(mut self, step: &str, message: &str) -> Self {
        self.errors.push(ErrorEntry {
            step: step.to_string(),
            message: message.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCount {
    pub message: String,
    pub count: usize,
}

/// Per-pipeline health analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub pipeline_key: String,
    pub summary: String,
    pub top_errors: Vec<ErrorCount>,
    pub recommendations: Vec<String>,
    /// Set when the analysis is a local placeholder standing in for a failed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}
