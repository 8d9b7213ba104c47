use comfy_table::{Cell, Color as TableColor};

use crate::config::{self, Config};

use super::tables::{create_table, cyan_header};

/// Prints the effective configuration with secrets masked.
pub fn print_settings(config: &Config) {
    println!("{}", render_settings(config));
}

fn render_settings(config: &Config) -> String {
    let ai = &config.ai;
    let source = if let Some(path) = &config.data_source.fixtures {
        format!("fixtures file {}", path.display())
    } else if config.data_source.use_mock {
        "built-in mock data".to_string()
    } else {
        "none".to_string()
    };

    let rows: Vec<(&str, Cell)> = vec![
        (config::ENV_ENDPOINT, value_cell(ai.endpoint.clone())),
        (config::ENV_API_KEY, value_cell(ai.api_key.as_deref().map(mask))),
        (config::ENV_DEPLOYMENT, value_cell(ai.deployment.clone())),
        (config::ENV_API_VERSION, Cell::new(&ai.api_version)),
        (config::ENV_ASSISTANT_ID, value_cell(ai.assistant_id.clone())),
        ("data source", Cell::new(source)),
        ("max attempts", Cell::new(config.analysis.max_attempts)),
        ("fail fast", Cell::new(config.analysis.fail_fast)),
        ("output format", Cell::new(format!("{:?}", config.output.format).to_lowercase())),
    ];

    let mut table = create_table();
    table.set_header(cyan_header(&["Setting", "Value"]));
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), value]);
    }
    table.to_string()
}

fn value_cell(value: Option<String>) -> Cell {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => Cell::new(v).fg(TableColor::Green),
        None => Cell::new("(not set)").fg(TableColor::Red),
    }
}

/// Keeps the first four characters of a secret.
fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}
