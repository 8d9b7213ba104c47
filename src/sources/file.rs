use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::error::{PipeSightError, Result};
use crate::models::{PipelinePlan, PipelineRun};

use super::types::sort_unique;
use super::PipelineSource;

/// Exported CI data in normalized form.
#[derive(Debug, Deserialize)]
struct FixtureFile {
    plans: Vec<PipelinePlan>,
    #[serde(default)]
    runs: HashMap<String, Vec<PipelineRun>>,
}

/// Reads plans and runs from a JSON export on disk.
///
/// The file is read on every fetch so a missing or corrupt export surfaces as
/// `DataUnavailable` at the point it is needed.
pub struct FixtureFileSource {
    path: PathBuf,
}

impl FixtureFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> Result<FixtureFile> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PipeSightError::DataUnavailable(format!("{}: {e}", self.path.display()))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            PipeSightError::DataUnavailable(format!(
                "{}: malformed export: {e}",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl PipelineSource for FixtureFileSource {
    async fn fetch_plans(&self) -> Result<Vec<PipelinePlan>> {
        let plans = sort_unique(self.load().await?.plans)?;
        debug!("Loaded {} plans from {}", plans.len(), self.path.display());
        Ok(plans)
    }

    async fn fetch_logs(&self, pipeline_key: &str) -> Result<Vec<PipelineRun>> {
        let mut export = self.load().await?;
        Ok(export.runs.remove(pipeline_key).unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "fixtures"
    }
}
