use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use crate::ai::AiClient;
use crate::analyzer::Analyzer;
use crate::config::{Config, OutputFormat};
use crate::orchestrator::{FailurePolicy, Orchestrator};
use crate::output;
use crate::sources;

#[derive(Parser)]
#[command(name = "pipesight")]
#[command(author, version, about = "CI/CD pipeline health reports", long_about = None)]
pub struct Cli {
    /// Question steering the analysis, e.g. "Why do integration tests keep failing?"
    #[arg(short, long, required_unless_present = "check_config")]
    question: Option<String>,

    /// Report format [default: from config, else markdown]
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Only print the report and errors
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log each stage and print an execution summary to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Write the report to a file instead of stdout
    #[arg(short = 'f', long)]
    out_file: Option<PathBuf>,

    /// Configuration file (toml, json or yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read plans and runs from a JSON export instead of mock data
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Stop at the first pipeline that cannot be analyzed
    #[arg(long)]
    fail_fast: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Validate the configuration, print the effective settings and exit
    #[arg(long)]
    check_config: bool,
}

impl Cli {
    /// Default `env_logger` filter; `RUST_LOG` takes precedence.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// File < environment < flags.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        config.apply_env();

        if let Some(fixtures) = &self.fixtures {
            config.data_source.fixtures = Some(fixtures.clone());
        }
        if let Some(format) = self.output {
            config.output.format = format;
        }
        config.analysis.fail_fast |= self.fail_fast;
        config.output.pretty |= self.pretty;

        Ok(config)
    }

    fn check_config(config: &Config) -> Result<()> {
        output::print_settings(config);
        config.validate().context("Configuration is incomplete")?;
        eprintln!("{}", output::bright_green("Configuration OK ✓"));
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = self.resolve_config()?;

        if self.check_config {
            return Self::check_config(&config);
        }

        let question = self
            .question
            .as_deref()
            .context("--question is required")?;

        config.validate()?;
        let source = sources::from_config(&config.data_source)?;
        let client = AiClient::new(&config.ai)?;
        let analyzer = Analyzer::new(client, &config.analysis);
        let policy = if config.analysis.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Degrade
        };

        info!("Generating {:?} report for: {question}", config.output.format);

        let started = Instant::now();
        let run = Orchestrator::new(source, analyzer)
            .with_policy(policy)
            .with_pretty(config.output.pretty)
            .with_progress(!self.quiet)
            .run(question, config.output.format)
            .await?;

        if self.verbose {
            output::print_summary(&run.report, started.elapsed());
        }

        if let Some(path) = &self.out_file {
            std::fs::write(path, &run.rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report written to: {}", path.display());
        } else {
            println!("{}", run.rendered);
        }

        Ok(())
    }
}
