//! Pipeline data sources.
//!
//! The orchestrator only sees [`PipelineSource`]; which variant backs it is
//! decided once at startup from the configuration.

mod file;
mod mock;
mod types;

use async_trait::async_trait;

use crate::config::DataSourceConfig;
use crate::error::{PipeSightError, Result};
use crate::models::{PipelinePlan, PipelineRun};

pub use file::FixtureFileSource;
pub use mock::MockSource;

/// Read access to CI plans and their run history.
#[async_trait]
pub trait PipelineSource: Send + Sync {
    /// All plans known to the source, in a deterministic order.
    async fn fetch_plans(&self) -> Result<Vec<PipelinePlan>>;

    /// Runs for one plan, newest first. Unknown keys yield an empty list.
    async fn fetch_logs(&self, pipeline_key: &str) -> Result<Vec<PipelineRun>>;

    /// Short label used in progress output.
    fn name(&self) -> &'static str;
}

/// Builds the source selected by the configuration.
///
/// # Errors
///
/// Returns a configuration error when mock data is disabled and no fixtures
/// file is given, since no live CI server client is available.
pub fn from_config(config: &DataSourceConfig) -> Result<Box<dyn PipelineSource>> {
    if let Some(path) = &config.fixtures {
        return Ok(Box::new(FixtureFileSource::new(path.clone())));
    }

    if config.use_mock {
        return Ok(Box::new(MockSource::new()));
    }

    Err(PipeSightError::Config(
        "Live CI server integration is not available; enable mock data or pass --fixtures"
            .to_string(),
    ))
}
