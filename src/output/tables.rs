use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::models::RunStatus;
use crate::report::Severity;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn color_coded_success_cell(rate: f64) -> Cell {
    let text = format!("{rate:.1}%");
    if rate > 80.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if rate >= 50.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn color_coded_duration_cell(seconds: f64) -> Cell {
    let minutes = seconds / 60.0;
    let text = format!("{minutes:.1}min");
    if minutes <= 10.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if minutes <= 15.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn status_cell(status: Option<RunStatus>) -> Cell {
    match status {
        Some(RunStatus::Success) => Cell::new("SUCCESS").fg(TableColor::Green),
        Some(RunStatus::Failed) => Cell::new("FAILED").fg(TableColor::Red),
        Some(RunStatus::InProgress) => Cell::new("IN_PROGRESS").fg(TableColor::Yellow),
        None => Cell::new("N/A").fg(TableColor::DarkGrey),
    }
}

pub fn severity_cell(severity: Severity) -> Cell {
    let text = format!("{severity:?}");
    match severity {
        Severity::High => Cell::new(text).fg(TableColor::Red),
        Severity::Medium => Cell::new(text).fg(TableColor::Yellow),
        Severity::Low => Cell::new(text).fg(TableColor::Green),
    }
}
