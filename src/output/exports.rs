use std::fmt::Write;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::report::{PipelineSection, Report};

/// Renders a report in the requested format.
///
/// - Markdown: human-readable document for chat, wikis and tickets
/// - JSON: structural serialization for programmatic consumers
pub fn render(report: &Report, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(render_markdown(report)),
        OutputFormat::Json => render_json(report, pretty),
    }
}

fn render_json(report: &Report, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    Ok(json)
}

// Writing into a String cannot fail, so `writeln!` results are discarded.
fn render_markdown(report: &Report) -> String {
    let mut md = String::new();
    let stats = &report.stats;

    let _ = writeln!(md, "# CI/CD Pipeline Report\n");
    let _ = writeln!(md, "**Question:** {}\n", report.question);
    let _ = writeln!(
        md,
        "**Quick summary:** {} {}\n",
        report.quick_summary.emoji(),
        report.quick_summary
    );
    let _ = writeln!(md, "{}\n", report.headline);

    let _ = writeln!(md, "## Overview\n");
    let _ = writeln!(md, "| Metric | Value |");
    let _ = writeln!(md, "|--------|-------|");
    let _ = writeln!(md, "| Pipelines | {} |", stats.pipelines_total);
    let _ = writeln!(md, "| Total runs | {} |", stats.runs_total);
    let _ = writeln!(md, "| Completed runs | {} |", stats.completed_runs);
    let _ = writeln!(
        md,
        "| Average duration | {}s ({}m) |",
        stats.avg_duration_seconds,
        stats.avg_duration_seconds / 60
    );
    let _ = writeln!(md, "| Success rate | {:.1}% |", stats.success_rate);
    let _ = writeln!(md, "| Total errors | {} |\n", stats.errors_total);

    let _ = writeln!(md, "## Issues\n");
    if report.issues.is_empty() {
        let _ = writeln!(md, "No issues detected. ✅\n");
    } else {
        for (i, issue) in report.issues.iter().enumerate() {
            let _ = writeln!(
                md,
                "{}. {} **{}**: {}",
                i + 1,
                issue.severity.emoji(),
                issue.pipeline_key,
                issue.message
            );
            let _ = writeln!(md, "   - Frequency: {} occurrences", issue.frequency);
            let _ = writeln!(md, "   - Severity: {:?}", issue.severity);
            if let Some(step) = &issue.affected_step {
                let _ = writeln!(md, "   - Step: {step}");
            }
            if let Some(last_seen) = issue.last_seen {
                let _ = writeln!(
                    md,
                    "   - Last seen: {}",
                    last_seen.format("%Y-%m-%d %H:%M UTC")
                );
            }
        }
        md.push('\n');
    }

    if !report.common_issues.is_empty() {
        let _ = writeln!(md, "### Shared across pipelines\n");
        for common in &report.common_issues {
            let _ = writeln!(
                md,
                "- {} ({} pipelines)",
                common.message, common.affected_pipelines
            );
        }
        md.push('\n');
    }

    if !report.recommendations.is_empty() {
        let _ = writeln!(md, "## Recommendations\n");
        for (i, recommendation) in report.recommendations.iter().enumerate() {
            let _ = writeln!(md, "{}. {recommendation}", i + 1);
        }
        md.push('\n');
    }

    let _ = writeln!(md, "## Pipelines\n");
    for section in &report.analyses {
        render_section(&mut md, section);
    }

    let _ = writeln!(md, "---");
    let _ = writeln!(
        md,
        "*Report generated by PipeSight v{}*",
        env!("CARGO_PKG_VERSION")
    );

    md
}

fn render_section(md: &mut String, section: &PipelineSection) {
    let analysis = &section.analysis;

    match &section.pipeline_name {
        Some(name) => {
            let _ = writeln!(md, "### {} - {}\n", analysis.pipeline_key, name);
        }
        None => {
            let _ = writeln!(md, "### {}\n", analysis.pipeline_key);
        }
    }

    if let Some(status) = section.latest_status {
        let _ = writeln!(md, "_Latest run: {status} ({} runs)_\n", section.run_count);
    }
    if let Some(reason) = &analysis.degraded {
        let _ = writeln!(
            md,
            "> ⚠️ Placeholder analysis, the model could not be used: {reason}\n"
        );
    }

    let _ = writeln!(md, "{}\n", analysis.summary);

    let _ = writeln!(md, "**Top errors**\n");
    if analysis.top_errors.is_empty() {
        let _ = writeln!(md, "_No errors recorded._\n");
    } else {
        for error in &analysis.top_errors {
            let _ = writeln!(md, "- {} — {}", error.message, error.count);
        }
        md.push('\n');
    }

    let _ = writeln!(md, "**Recommendations**\n");
    if analysis.recommendations.is_empty() {
        let _ = writeln!(md, "_None._\n");
    } else {
        for recommendation in &analysis.recommendations {
            let _ = writeln!(md, "- {recommendation}");
        }
        md.push('\n');
    }
}
