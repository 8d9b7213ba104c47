use log::{info, warn};

use crate::analyzer::{heuristic, Analyzer};
use crate::config::OutputFormat;
use crate::error::{PipeSightError, Result};
use crate::models::{Analysis, PipelinePlan, PipelineRun};
use crate::output::{self, Phase, PhaseProgress};
use crate::report::{Report, RunsByPipeline};
use crate::sources::PipelineSource;

/// What to do when one pipeline's logs or analysis cannot be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Substitute a local placeholder analysis and keep going.
    #[default]
    Degrade,
    /// Stop the run with the pipeline's error.
    Abort,
}

pub struct RunOutput {
    pub report: Report,
    pub rendered: String,
}

/// Drives one reporting run: plans, then logs and analysis per pipeline,
/// then the report.
pub struct Orchestrator {
    source: Box<dyn PipelineSource>,
    analyzer: Analyzer,
    policy: FailurePolicy,
    pretty: bool,
    show_progress: bool,
}

impl Orchestrator {
    pub fn new(source: Box<dyn PipelineSource>, analyzer: Analyzer) -> Self {
        Self {
            source,
            analyzer,
            policy: FailurePolicy::default(),
            pretty: false,
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Produces the report for `question` rendered as `format`.
    ///
    /// Pipelines are processed one at a time in plan order.
    ///
    /// # Errors
    ///
    /// Fails when plans cannot be fetched, when every pipeline ended with a
    /// placeholder analysis, or, under [`FailurePolicy::Abort`], on the first
    /// pipeline whose logs or analysis could not be obtained.
    pub async fn run(&self, question: &str, format: OutputFormat) -> Result<RunOutput> {
        let mut progress = PhaseProgress::new(self.show_progress);
        let result = self.execute(question, format, &mut progress).await;
        match &result {
            Ok(_) => progress.finish(),
            Err(e) => progress.fail(&e.to_string()),
        }
        result
    }

    async fn execute(
        &self,
        question: &str,
        format: OutputFormat,
        progress: &mut PhaseProgress,
    ) -> Result<RunOutput> {
        progress.start(Phase::FetchPlans);
        info!("Fetching pipeline plans from {} source", self.source.name());
        let plans = self.source.fetch_plans().await?;
        info!("Found {} pipelines", plans.len());

        progress.start(Phase::AnalyzePipelines);
        let mut runs = RunsByPipeline::new();
        let mut analyses = Vec::with_capacity(plans.len());
        for (index, plan) in plans.iter().enumerate() {
            progress.detail(&format!("{} {}/{}", plan.key, index + 1, plans.len()));
            let (plan_runs, analysis) = self.process_pipeline(question, plan).await?;
            runs.insert(plan.key.clone(), plan_runs);
            analyses.push(analysis);
        }

        let degraded: Vec<&Analysis> = analyses.iter().filter(|a| a.degraded.is_some()).collect();
        if !analyses.is_empty() && degraded.len() == analyses.len() {
            return Err(PipeSightError::AllAnalysesFailed {
                count: analyses.len(),
                last_error: degraded
                    .last()
                    .and_then(|a| a.degraded.clone())
                    .unwrap_or_default(),
            });
        }

        progress.start(Phase::BuildReport);
        let report = Report::build(question, &plans, &runs, analyses);
        info!(
            "Report built: {} ({} placeholder analyses)",
            report.quick_summary,
            report.degraded_count()
        );

        progress.start(Phase::Render);
        let rendered = output::render(&report, format, self.pretty)?;

        Ok(RunOutput { report, rendered })
    }

    async fn process_pipeline(
        &self,
        question: &str,
        plan: &PipelinePlan,
    ) -> Result<(Vec<PipelineRun>, Analysis)> {
        let runs = match self.source.fetch_logs(&plan.key).await {
            Ok(runs) => runs,
            Err(e) => {
                let placeholder = self.placeholder(plan, &[], e)?;
                return Ok((Vec::new(), placeholder));
            }
        };
        info!("Fetched {} runs for {}", runs.len(), plan.key);

        let analysis = match self.analyzer.analyze(question, plan, &runs).await {
            Ok(analysis) => analysis,
            Err(e) => self.placeholder(plan, &runs, e)?,
        };
        Ok((runs, analysis))
    }

    /// Applies the failure policy to a pipeline-level error.
    fn placeholder(
        &self,
        plan: &PipelinePlan,
        runs: &[PipelineRun],
        error: PipeSightError,
    ) -> Result<Analysis> {
        match self.policy {
            FailurePolicy::Abort => Err(error),
            FailurePolicy::Degrade => {
                warn!("Using placeholder analysis for {}: {error}", plan.key);
                Ok(Analysis {
                    degraded: Some(error.to_string()),
                    ..heuristic::analyze(plan, runs, self.analyzer.top_errors())
                })
            }
        }
    }
}
