use std::fmt::Write;
use std::time::Duration;

use comfy_table::{Cell, Color as TableColor};

use crate::report::Report;

use super::styling::{
    bright, bright_green, bright_red, bright_yellow, cyan, dim, quick_summary_styled,
};
use super::tables::{
    color_coded_duration_cell, color_coded_success_cell, create_table, cyan_header, severity_cell,
    status_cell,
};

const MAX_ISSUE_ROWS: usize = 10;

/// Prints an execution summary of the run to stderr.
///
/// Displays color-coded tables showing:
/// - Overview: pipelines, runs, success rate, average duration, quick summary
/// - Pipelines: latest status, run and error counts, analysis source
/// - Issues: the most severe recurring errors
/// - Pipelines with recorded errors and the elapsed run time
pub fn print_summary(report: &Report, elapsed: Duration) {
    eprintln!("{}", render_summary(report, elapsed));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

#[allow(clippy::cast_precision_loss)]
fn render_summary(report: &Report, elapsed: Duration) -> String {
    let mut output = String::new();
    let stats = &report.stats;

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n",
        dim("Question:"),
        cyan(&report.question),
        dim("Quick summary:"),
        quick_summary_styled(report.quick_summary)
    );

    let mut overview = create_table();
    overview.set_header(cyan_header(&["Metric", "Value"]));
    overview.add_row(vec![Cell::new("Pipelines"), Cell::new(stats.pipelines_total)]);
    overview.add_row(vec![Cell::new("Runs"), Cell::new(stats.runs_total)]);
    overview.add_row(vec![
        Cell::new("Success rate"),
        color_coded_success_cell(stats.success_rate),
    ]);
    overview.add_row(vec![
        Cell::new("Average duration"),
        color_coded_duration_cell(stats.avg_duration_seconds as f64),
    ]);
    overview.add_row(vec![Cell::new("Errors"), Cell::new(stats.errors_total)]);
    let _ = writeln!(output, "{overview}\n");

    if report.analyses.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No pipeline data found."));
        write_elapsed(&mut output, elapsed);
        return output;
    }

    add_section_header(&mut output, "📋", "Pipelines");
    let mut pipelines = create_table();
    pipelines.set_header(cyan_header(&[
        "Pipeline", "Name", "Latest", "Runs", "Errors", "Analysis",
    ]));
    for section in &report.analyses {
        let source = match &section.analysis.degraded {
            Some(_) => Cell::new("placeholder").fg(TableColor::Yellow),
            None => Cell::new("model").fg(TableColor::Green),
        };
        pipelines.add_row(vec![
            Cell::new(&section.analysis.pipeline_key),
            Cell::new(section.pipeline_name.as_deref().unwrap_or("N/A")),
            status_cell(section.latest_status),
            Cell::new(section.run_count),
            Cell::new(section.error_count),
            source,
        ]);
    }
    let _ = writeln!(output, "{pipelines}\n");

    if !report.issues.is_empty() {
        add_section_header(&mut output, "❌", "Issues");
        let mut issues = create_table();
        issues.set_header(cyan_header(&["#", "Severity", "Pipeline", "Error", "Count"]));
        for (idx, issue) in report.issues.iter().take(MAX_ISSUE_ROWS).enumerate() {
            issues.add_row(vec![
                Cell::new(idx + 1),
                severity_cell(issue.severity),
                Cell::new(&issue.pipeline_key),
                Cell::new(&issue.message),
                Cell::new(issue.frequency),
            ]);
        }
        if report.issues.len() > MAX_ISSUE_ROWS {
            issues.add_row(vec![Cell::new(format!(
                "... and {} more",
                report.issues.len() - MAX_ISSUE_ROWS
            ))
            .fg(TableColor::DarkGrey)]);
        }
        let _ = writeln!(output, "{issues}\n");
    }

    let degraded = report.degraded_count();
    if degraded > 0 {
        let _ = writeln!(
            output,
            "  {} {} of {} analyses are placeholders; rerun with {} for details",
            cyan("•"),
            bright_yellow(degraded),
            report.analyses.len(),
            bright_yellow("RUST_LOG=debug")
        );
    }

    let failing: Vec<&str> = report
        .analyses
        .iter()
        .filter(|section| !section.analysis.top_errors.is_empty())
        .map(|section| section.analysis.pipeline_key.as_str())
        .collect();
    if failing.is_empty() {
        let _ = writeln!(
            output,
            "  {}",
            bright_green("✅ No actively failing pipelines detected")
        );
    } else {
        let _ = writeln!(
            output,
            "  {} {}",
            bright_red("🔴 Failing pipelines:"),
            failing.join(", ")
        );
    }

    write_elapsed(&mut output, elapsed);
    output
}

fn write_elapsed(output: &mut String, elapsed: Duration) {
    let _ = writeln!(
        output,
        "  {} {}",
        dim("Analysis completed in"),
        cyan(format!("{:.2}s", elapsed.as_secs_f64()))
    );
}
