use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::warn;
use serde::Serialize;
use std::fmt;

use crate::analyzer::error_total;
use crate::models::{Analysis, PipelinePlan, PipelineRun, RunStatus};

/// Runs per pipeline key, each list ordered newest first.
pub type RunsByPipeline = IndexMap<String, Vec<PipelineRun>>;

const HIGH_SEVERITY_KEYWORDS: [&str; 8] = [
    "timeout",
    "connection",
    "database",
    "service unavailable",
    "out of memory",
    "disk space",
    "network",
    "authentication failed",
];

const MEDIUM_SEVERITY_KEYWORDS: [&str; 6] = [
    "test failed",
    "assertion",
    "compilation error",
    "build failed",
    "dependency",
    "configuration",
];

const MAX_COMMON_ISSUES: usize = 3;
const MAX_FLEET_RECOMMENDATIONS: usize = 5;

/// Aggregate health of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickSummary {
    Healthy,
    Warning,
    Critical,
}

impl QuickSummary {
    /// `Critical` when any pipeline's latest run failed, `Healthy` when no run
    /// recorded an error, `Warning` otherwise.
    pub fn classify<'a, I>(runs_per_pipeline: I) -> Self
    where
        I: IntoIterator<Item = &'a [PipelineRun]>,
    {
        let mut errors_total = 0;
        let mut latest_failed = false;
        for runs in runs_per_pipeline {
            latest_failed |= runs
                .first()
                .is_some_and(|latest| latest.status == RunStatus::Failed);
            errors_total += error_total(runs);
        }

        if latest_failed {
            Self::Critical
        } else if errors_total == 0 {
            Self::Healthy
        } else {
            Self::Warning
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Healthy => "🟢",
            Self::Warning => "🟡",
            Self::Critical => "🔴",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for QuickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn of(message: &str, frequency: usize) -> Self {
        let lower = message.to_lowercase();
        if frequency >= 3 || HIGH_SEVERITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::High
        } else if frequency >= 2 || MEDIUM_SEVERITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::High => "🔴",
            Self::Medium => "🟡",
            Self::Low => "🟢",
        }
    }
}

/// One pipeline's analysis together with the context it was produced from.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSection {
    #[serde(flatten)]
    pub analysis: Analysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_status: Option<RunStatus>,
    pub run_count: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportStats {
    pub pipelines_total: usize,
    pub runs_total: usize,
    pub completed_runs: usize,
    pub errors_total: usize,
    pub avg_duration_seconds: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub pipeline_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_name: Option<String>,
    pub message: String,
    pub frequency: usize,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonIssue {
    pub message: String,
    pub affected_pipelines: usize,
}

/// Everything a run produced, ready to be rendered.
///
/// Carries no generation timestamp so that identical inputs always produce
/// identical output.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub question: String,
    pub headline: String,
    pub quick_summary: QuickSummary,
    pub stats: ReportStats,
    pub analyses: Vec<PipelineSection>,
    pub issues: Vec<Issue>,
    pub common_issues: Vec<CommonIssue>,
    /// Deduplicated across pipelines; advice given for several pipelines first.
    pub recommendations: Vec<String>,
}

impl Report {
    /// Assembles the report; `analyses` keep their input order.
    ///
    /// An analysis whose key matches no plan is kept without a pipeline name
    /// and logged.
    pub fn build(
        question: &str,
        plans: &[PipelinePlan],
        runs: &RunsByPipeline,
        analyses: Vec<Analysis>,
    ) -> Self {
        let names: IndexMap<&str, &str> = plans
            .iter()
            .map(|plan| (plan.key.as_str(), plan.name.as_str()))
            .collect();

        let sections: Vec<PipelineSection> = analyses
            .into_iter()
            .map(|analysis| {
                let pipeline_name = names
                    .get(analysis.pipeline_key.as_str())
                    .map(|n| (*n).to_string());
                if pipeline_name.is_none() {
                    warn!(
                        "Analysis for {} has no matching plan in this run",
                        analysis.pipeline_key
                    );
                }
                let pipeline_runs = runs
                    .get(&analysis.pipeline_key)
                    .map_or(&[][..], Vec::as_slice);
                PipelineSection {
                    pipeline_name,
                    latest_status: pipeline_runs.first().map(|run| run.status),
                    run_count: pipeline_runs.len(),
                    error_count: error_total(pipeline_runs),
                    analysis,
                }
            })
            .collect();

        let quick_summary = QuickSummary::classify(runs.values().map(Vec::as_slice));
        let stats = compute_stats(sections.len(), runs);
        let issues = collect_issues(&sections, runs);
        let common_issues = find_common_issues(&sections);
        let recommendations = fleet_recommendations(&sections);

        let high = issues
            .iter()
            .filter(|issue| issue.severity == Severity::High)
            .count();
        let headline = format!(
            "{} {} - {} pipelines, {} errors, {} high-severity issues",
            quick_summary.emoji(),
            quick_summary.label(),
            stats.pipelines_total,
            stats.errors_total,
            high
        );

        Self {
            question: question.to_string(),
            headline,
            quick_summary,
            stats,
            analyses: sections,
            issues,
            common_issues,
            recommendations,
        }
    }

    pub fn degraded_count(&self) -> usize {
        self.analyses
            .iter()
            .filter(|section| section.analysis.degraded.is_some())
            .count()
    }
}

fn compute_stats(pipelines_total: usize, runs: &RunsByPipeline) -> ReportStats {
    let all_runs = || runs.values().flatten();

    let durations: Vec<u64> = all_runs()
        .map(|run| run.duration_seconds)
        .filter(|duration| *duration > 0)
        .collect();
    let successful = all_runs()
        .filter(|run| run.status == RunStatus::Success)
        .count();
    let finished = all_runs()
        .filter(|run| run.status != RunStatus::InProgress)
        .count();

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let avg_duration_seconds = if durations.is_empty() {
        0
    } else {
        (durations.iter().sum::<u64>() as f64 / durations.len() as f64).round() as u64
    };

    #[allow(clippy::cast_precision_loss)]
    let success_rate = if finished == 0 {
        0.0
    } else {
        (successful as f64 / finished as f64 * 1000.0).round() / 10.0
    };

    ReportStats {
        pipelines_total,
        runs_total: all_runs().count(),
        completed_runs: durations.len(),
        errors_total: all_runs().map(|run| run.errors.len()).sum(),
        avg_duration_seconds,
        success_rate,
    }
}

fn collect_issues(sections: &[PipelineSection], runs: &RunsByPipeline) -> Vec<Issue> {
    let mut issues: Vec<Issue> = sections
        .iter()
        .flat_map(|section| {
            let pipeline_runs = runs
                .get(&section.analysis.pipeline_key)
                .map_or(&[][..], Vec::as_slice);
            section.analysis.top_errors.iter().map(move |error| {
                // Newest run first, so the first hit is the most recent occurrence.
                let occurrence = pipeline_runs.iter().find_map(|run| {
                    run.errors
                        .iter()
                        .find(|entry| entry.message == error.message)
                        .map(|entry| (run, entry))
                });
                Issue {
                    pipeline_key: section.analysis.pipeline_key.clone(),
                    pipeline_name: section.pipeline_name.clone(),
                    message: error.message.clone(),
                    frequency: error.count,
                    severity: Severity::of(&error.message, error.count),
                    affected_step: occurrence.map(|(_, entry)| entry.step.clone()),
                    last_seen: occurrence.and_then(|(run, _)| run.started_at),
                }
            })
        })
        .collect();

    issues.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.frequency.cmp(&a.frequency))
    });
    issues
}

fn find_common_issues(sections: &[PipelineSection]) -> Vec<CommonIssue> {
    let mut pipelines_per_message: IndexMap<&str, usize> = IndexMap::new();
    for section in sections {
        for error in &section.analysis.top_errors {
            *pipelines_per_message.entry(error.message.as_str()).or_insert(0) += 1;
        }
    }

    let mut common: Vec<CommonIssue> = pipelines_per_message
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(message, affected_pipelines)| CommonIssue {
            message: message.to_string(),
            affected_pipelines,
        })
        .collect();
    common.sort_by(|a, b| b.affected_pipelines.cmp(&a.affected_pipelines));
    common.truncate(MAX_COMMON_ISSUES);
    common
}

fn fleet_recommendations(sections: &[PipelineSection]) -> Vec<String> {
    let mut pipelines_per_advice: IndexMap<&str, usize> = IndexMap::new();
    for section in sections {
        let mut seen: Vec<&str> = Vec::new();
        for advice in &section.analysis.recommendations {
            let advice = advice.trim();
            if advice.is_empty() || seen.contains(&advice) {
                continue;
            }
            seen.push(advice);
            *pipelines_per_advice.entry(advice).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = pipelines_per_advice.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(MAX_FLEET_RECOMMENDATIONS)
        .map(|(advice, _)| advice.to_string())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analyzer::rank_errors;
    use crate::models::ErrorCount;
    use chrono::TimeZone;

    pub(crate) fn plan(key: &str, name: &str) -> PipelinePlan {
        PipelinePlan {
            key: key.to_string(),
            name: name.to_string(),
            enabled: true,
            is_building: false,
            average_build_time_in_seconds: 300,
            link: String::new(),
            short_name: None,
            project_key: None,
            project_name: None,
            description: None,
        }
    }

    pub(crate) fn analysis_for(key: &str, runs: &[PipelineRun]) -> Analysis {
        Analysis {
            pipeline_key: key.to_string(),
            summary: format!("{key} summary"),
            top_errors: rank_errors(runs, 5),
            recommendations: vec!["Keep an eye on it".to_string()],
            degraded: None,
        }
    }

    fn runs_of(entries: Vec<(&str, Vec<PipelineRun>)>) -> RunsByPipeline {
        entries
            .into_iter()
            .map(|(key, runs)| (key.to_string(), runs))
            .collect()
    }

    fn ok(id: &str) -> PipelineRun {
        PipelineRun::new(id, RunStatus::Success, 300)
    }

    #[test]
    fn test_classification_table() {
        let cases: Vec<(Vec<Vec<PipelineRun>>, QuickSummary)> = vec![
            (vec![], QuickSummary::Healthy),
            (vec![vec![ok("a"), ok("b")], vec![]], QuickSummary::Healthy),
            (
                vec![vec![
                    ok("a"),
                    PipelineRun::new("b", RunStatus::Failed, 10).with_error("t", "x"),
                ]],
                QuickSummary::Warning,
            ),
            (
                vec![vec![
                    PipelineRun::new("c", RunStatus::InProgress, 0),
                    PipelineRun::new("b", RunStatus::Failed, 10).with_error("t", "x"),
                ]],
                QuickSummary::Warning,
            ),
            (
                vec![vec![ok("a")], vec![PipelineRun::new("b", RunStatus::Failed, 10)]],
                QuickSummary::Critical,
            ),
            (
                vec![vec![PipelineRun::new("b", RunStatus::Failed, 10).with_error("t", "timeout")]],
                QuickSummary::Critical,
            ),
        ];

        for (runs, expected) in cases {
            let got = QuickSummary::classify(runs.iter().map(Vec::as_slice));
            assert_eq!(got, expected, "runs: {runs:?}");
        }
    }

    #[test]
    fn test_quick_summary_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&QuickSummary::Critical).unwrap(), "\"critical\"");
        assert_eq!(QuickSummary::Warning.to_string(), "warning");
    }

    #[test]
    fn test_severity_rules() {
        assert_eq!(Severity::of("Database connection timeout", 1), Severity::High);
        assert_eq!(Severity::of("lint warning", 3), Severity::High);
        assert_eq!(Severity::of("AssertionError: expected 1", 1), Severity::Medium);
        assert_eq!(Severity::of("lint warning", 2), Severity::Medium);
        assert_eq!(Severity::of("lint warning", 1), Severity::Low);
    }

    #[test]
    fn test_build_keeps_input_order_and_names() {
        let plans = vec![plan("B-1", "Beta"), plan("A-1", "Alpha")];
        let runs = runs_of(vec![("B-1", vec![ok("b1")]), ("A-1", vec![ok("a1")])]);
        let analyses = vec![analysis_for("B-1", &runs["B-1"]), analysis_for("A-1", &runs["A-1"])];

        let report = Report::build("How healthy?", &plans, &runs, analyses);

        let keys: Vec<&str> = report
            .analyses
            .iter()
            .map(|s| s.analysis.pipeline_key.as_str())
            .collect();
        assert_eq!(keys, vec!["B-1", "A-1"]);
        assert_eq!(report.analyses[0].pipeline_name.as_deref(), Some("Beta"));
        assert_eq!(report.analyses[0].latest_status, Some(RunStatus::Success));
        assert_eq!(report.quick_summary, QuickSummary::Healthy);
        assert_eq!(report.headline, "🟢 Healthy - 2 pipelines, 0 errors, 0 high-severity issues");
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_orphan_analysis_is_kept() {
        let plans = vec![plan("A-1", "Alpha")];
        let runs = runs_of(vec![("A-1", vec![ok("a1")])]);
        let analyses = vec![analysis_for("A-1", &runs["A-1"]), analysis_for("GHOST-1", &[])];

        let report = Report::build("q", &plans, &runs, analyses);

        assert_eq!(report.analyses.len(), 2);
        let orphan = &report.analyses[1];
        assert_eq!(orphan.analysis.pipeline_key, "GHOST-1");
        assert!(orphan.pipeline_name.is_none());
        assert_eq!(orphan.run_count, 0);
        assert_eq!(orphan.error_count, 0);
    }

    #[test]
    fn test_stats() {
        let runs = runs_of(vec![
            ("A-1", vec![ok("a2"), PipelineRun::new("a1", RunStatus::Success, 400)]),
            (
                "B-1",
                vec![
                    PipelineRun::new("b3", RunStatus::InProgress, 0),
                    PipelineRun::new("b2", RunStatus::Failed, 501)
                        .with_error("test", "x")
                        .with_error("test", "y"),
                ],
            ),
        ]);

        let stats = compute_stats(2, &runs);

        assert_eq!(
            stats,
            ReportStats {
                pipelines_total: 2,
                runs_total: 4,
                completed_runs: 3,
                errors_total: 2,
                avg_duration_seconds: 400,
                success_rate: 66.7,
            }
        );
        assert!((compute_stats(0, &RunsByPipeline::new()).success_rate).abs() < f64::EPSILON);
    }

    #[test]
    fn test_issues_sorted_with_context() {
        let started = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let mut newest = PipelineRun::new("b2", RunStatus::Failed, 100)
            .with_error("integration", "Database connection timeout");
        newest.started_at = Some(started);
        let runs = runs_of(vec![(
            "B-1",
            vec![
                newest,
                PipelineRun::new("b1", RunStatus::Failed, 100)
                    .with_error("lint", "style nit")
                    .with_error("lint", "style nit")
                    .with_error("integration", "Database connection timeout"),
            ],
        )]);
        let plans = vec![plan("B-1", "Beta")];
        let analyses = vec![analysis_for("B-1", &runs["B-1"])];

        let report = Report::build("q", &plans, &runs, analyses);

        assert_eq!(report.issues.len(), 2);
        let first = &report.issues[0];
        assert_eq!(first.message, "Database connection timeout");
        assert_eq!(first.severity, Severity::High);
        assert_eq!(first.affected_step.as_deref(), Some("integration"));
        assert_eq!(first.last_seen, Some(started));
        assert_eq!(report.issues[1].severity, Severity::Medium);
        assert_eq!(report.issues[1].last_seen, None);
        assert!(report
            .headline
            .starts_with("🔴 Critical - 1 pipelines, 4 errors, 1 high-severity"));
    }

    #[test]
    fn test_common_issues_span_pipelines() {
        let shared = ErrorCount {
            message: "npm registry unreachable".to_string(),
            count: 1,
        };
        let mut a = analysis_for("A-1", &[]);
        a.top_errors = vec![shared.clone()];
        let mut b = analysis_for("B-1", &[]);
        b.top_errors = vec![
            ErrorCount {
                message: "only here".to_string(),
                count: 1,
            },
            shared,
        ];

        let report = Report::build("q", &[], &RunsByPipeline::new(), vec![a, b]);

        assert_eq!(
            report.common_issues,
            vec![CommonIssue {
                message: "npm registry unreachable".to_string(),
                affected_pipelines: 2
            }]
        );
    }

    #[test]
    fn test_fleet_recommendations_dedupe_and_rank() {
        let advise = |key: &str, recs: &[&str]| {
            let mut analysis = analysis_for(key, &[]);
            analysis.recommendations = recs.iter().map(|r| (*r).to_string()).collect();
            analysis
        };
        let analyses = vec![
            advise("A-1", &["Pin the base image", "Raise test timeouts", "Pin the base image"]),
            advise("B-1", &["Cache dependencies", "Raise test timeouts"]),
            advise("C-1", &["Split the slow suite", "Retry flaky steps", "Add disk alerts"]),
        ];

        let report = Report::build("q", &[], &RunsByPipeline::new(), analyses);

        assert_eq!(
            report.recommendations,
            vec![
                "Raise test timeouts",
                "Pin the base image",
                "Cache dependencies",
                "Split the slow suite",
                "Retry flaky steps",
            ]
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["recommendations"][0], "Raise test timeouts");
    }
}
