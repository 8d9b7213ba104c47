use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::error::{PipeSightError, Result};
use crate::models::{PipelinePlan, PipelineRun};

use super::types::{normalize_plans, BambooPlansResponse, RunLog};
use super::PipelineSource;

const PLANS_FIXTURE: &str = include_str!("../../fixtures/plans.json");
const RUNS_FIXTURE: &str = include_str!("../../fixtures/runs.json");

#[derive(Debug, Deserialize)]
struct RunFixtures {
    pipelines: HashMap<String, RunLog>,
}

/// Static, deterministic CI data for development and tests.
///
/// Plans are stored in Bamboo's `GET /plan` payload shape and normalized on
/// every fetch, exactly as a live client would have to.
#[derive(Debug, Default)]
pub struct MockSource;

impl MockSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PipelineSource for MockSource {
    async fn fetch_plans(&self) -> Result<Vec<PipelinePlan>> {
        let raw: BambooPlansResponse = serde_json::from_str(PLANS_FIXTURE)
            .map_err(|e| PipeSightError::DataUnavailable(format!("plan fixture: {e}")))?;
        let plans = normalize_plans(raw)?;
        debug!("Mock source returned {} plans", plans.len());
        Ok(plans)
    }

    async fn fetch_logs(&self, pipeline_key: &str) -> Result<Vec<PipelineRun>> {
        let mut fixtures: RunFixtures = serde_json::from_str(RUNS_FIXTURE)
            .map_err(|e| PipeSightError::DataUnavailable(format!("run fixture: {e}")))?;

        let runs = fixtures
            .pipelines
            .remove(pipeline_key)
            .map(|log| log.runs)
            .unwrap_or_default();
        debug!("Mock source returned {} runs for {pipeline_key}", runs.len());
        Ok(runs)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
