mod ai;
mod analyzer;
mod cli;
mod config;
mod error;
mod models;
mod orchestrator;
mod output;
mod report;
mod sources;

use clap::Parser;
use cli::Cli;
use log::{info, warn};

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    if let Some(e) = dotenv_problem(dotenv) {
        warn!("Ignoring .env file: {e}");
    }

    if !cli.quiet() {
        output::print_banner();
    }

    info!("Starting PipeSight - CI/CD Pipeline Health Reports");
    if let Err(e) = cli.execute().await {
        eprintln!("{} {e:#}", output::bright_red("error:"));
        std::process::exit(1);
    }
}

/// A missing `.env` is normal; anything else is worth reporting.
fn dotenv_problem<T>(result: Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    result.err().filter(|e| !e.not_found())
}
