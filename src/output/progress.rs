use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_red, bright_yellow};

const TOTAL_PHASES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    FetchPlans,
    AnalyzePipelines,
    BuildReport,
    Render,
}

impl Phase {
    fn number(self) -> usize {
        match self {
            Self::FetchPlans => 1,
            Self::AnalyzePipelines => 2,
            Self::BuildReport => 3,
            Self::Render => 4,
        }
    }

    fn running(self) -> &'static str {
        match self {
            Self::FetchPlans => "Fetching pipeline plans",
            Self::AnalyzePipelines => "Fetching logs and analyzing pipelines",
            Self::BuildReport => "Aggregating report",
            Self::Render => "Rendering report",
        }
    }

    fn done(self) -> &'static str {
        match self {
            Self::FetchPlans => "Fetched pipeline plans",
            Self::AnalyzePipelines => "Analyzed all pipelines",
            Self::BuildReport => "Aggregated report",
            Self::Render => "Report rendered successfully",
        }
    }

    fn label(self, text: &str) -> String {
        format!("Phase {}/{TOTAL_PHASES}: {text}", self.number())
    }
}

/// Progress tracking for the run's phases, drawn on stderr.
///
/// A disabled tracker accepts every call and draws nothing.
pub struct PhaseProgress {
    enabled: bool,
    current: Option<(Phase, ProgressBar)>,
}

impl PhaseProgress {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        }
        Self {
            enabled,
            current: None,
        }
    }

    /// Marks the running phase as done and starts `phase`.
    pub fn start(&mut self, phase: Phase) {
        self.finish_current();
        if self.enabled {
            let pb = create_spinner(bright_yellow(phase.label(phase.running())).to_string());
            self.current = Some((phase, pb));
        }
    }

    /// Shows what the running phase is working on.
    pub fn detail(&self, detail: &str) {
        if let Some((phase, pb)) = &self.current {
            pb.set_message(
                bright_yellow(format!("{} ({detail})", phase.label(phase.running()))).to_string(),
            );
        }
    }

    pub fn finish(&mut self) {
        self.finish_current();
        if self.enabled {
            eprintln!();
        }
    }

    pub fn fail(&mut self, reason: &str) {
        if let Some((phase, pb)) = self.current.take() {
            pb.abandon_with_message(
                bright_red(format!("{} ✗ {reason}", phase.label(phase.running()))).to_string(),
            );
        }
    }

    fn finish_current(&mut self) {
        if let Some((phase, pb)) = self.current.take() {
            let done = format!("{} ✓", phase.label(phase.done()));
            pb.finish_with_message(bright_green(done).to_string());
        }
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
