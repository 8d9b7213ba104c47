mod exports;
mod progress;
mod settings;
mod styling;
mod summary;
mod tables;

pub use exports::render;
pub use progress::{Phase, PhaseProgress};
pub use settings::print_settings;
pub use styling::{bright_green, bright_red};
pub use summary::print_summary;

use styling::{dim, magenta_bold};

/// Prints the `PipeSight` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔍 PipeSight"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI/CD Pipeline Health Reports")
    );
}
