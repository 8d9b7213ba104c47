use crate::models::{Analysis, PipelinePlan, PipelineRun, RunStatus};

use super::ranking::rank_errors;

const MAX_RECOMMENDATIONS: usize = 5;
const SLOW_RUN_SECONDS: f64 = 1800.0;

/// Local, deterministic analysis built without the completion endpoint.
///
/// Used as the placeholder for pipelines whose analysis could not be obtained.
pub fn analyze(plan: &PipelinePlan, runs: &[PipelineRun], top_errors: usize) -> Analysis {
    if runs.is_empty() {
        return Analysis {
            pipeline_key: plan.key.clone(),
            summary: format!("No execution data available for {}.", plan.name),
            top_errors: Vec::new(),
            recommendations: vec!["Configure pipeline to capture execution logs".to_string()],
            degraded: None,
        };
    }

    let total = runs.len();
    let successful = count_status(runs, RunStatus::Success);
    let failed = count_status(runs, RunStatus::Failed);
    let in_progress = count_status(runs, RunStatus::InProgress);

    #[allow(clippy::cast_precision_loss)]
    let success_rate = successful as f64 / total as f64 * 100.0;

    let completed: Vec<u64> = runs
        .iter()
        .map(|run| run.duration_seconds)
        .filter(|duration| *duration > 0)
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let avg_duration = if completed.is_empty() {
        0.0
    } else {
        completed.iter().sum::<u64>() as f64 / completed.len() as f64
    };

    let health = match success_rate {
        rate if rate >= 90.0 => "excellent",
        rate if rate >= 75.0 => "good",
        rate if rate >= 50.0 => "concerning",
        _ => "poor",
    };

    let mut summary_parts = vec![format!(
        "Pipeline shows {health} health with {success_rate:.1}% success rate ({successful}/{total} runs)"
    )];
    if avg_duration > 0.0 {
        summary_parts.push(format!(
            "Average execution time is {:.0} minutes",
            (avg_duration / 60.0).floor()
        ));
    }
    if failed > 0 {
        summary_parts.push(format!("{failed} recent failures requiring attention"));
    }
    let summary = summary_parts.join(". ") + ".";

    let ranked = rank_errors(runs, top_errors);
    let messages = runs
        .iter()
        .flat_map(|run| &run.errors)
        .map(|error| error.message.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let rules: [(bool, &str); 8] = [
        (
            success_rate < 75.0,
            "Investigate recurring failures to improve pipeline stability",
        ),
        (
            !ranked.is_empty(),
            "Address top error patterns to reduce failure rate",
        ),
        (
            avg_duration > SLOW_RUN_SECONDS,
            "Consider optimizing build steps to reduce execution time",
        ),
        (
            failed > successful,
            "Pipeline requires immediate attention due to high failure rate",
        ),
        (
            in_progress > 0,
            "Monitor currently running builds for potential issues",
        ),
        (
            messages.contains("timeout"),
            "Review timeout configurations and resource allocation",
        ),
        (
            messages.contains("test") && messages.contains("failed"),
            "Focus on test stability and test environment configuration",
        ),
        (
            messages.contains("connection") || messages.contains("network"),
            "Investigate network connectivity and service dependencies",
        ),
    ];

    let mut recommendations: Vec<String> = rules
        .iter()
        .filter(|(applies, _)| *applies)
        .map(|(_, text)| (*text).to_string())
        .take(MAX_RECOMMENDATIONS)
        .collect();

    if recommendations.is_empty() {
        let fallback = if success_rate >= 90.0 {
            "Pipeline performing well, continue monitoring"
        } else {
            "Monitor pipeline trends and investigate any performance degradation"
        };
        recommendations.push(fallback.to_string());
    }

    Analysis {
        pipeline_key: plan.key.clone(),
        summary,
        top_errors: ranked,
        recommendations,
        degraded: None,
    }
}

fn count_status(runs: &[PipelineRun], status: RunStatus) -> usize {
    runs.iter().filter(|run| run.status == status).count()
}
