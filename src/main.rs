//! DAX CLI - Layer Recursion Pipeline
//!
//! Command-line interface for the DAX layer pipeline.

use clap::Parser;
use env_logger::Env;
use log::debug;

use dax::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("DAX v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run {
            input,
            input_file,
            report,
            trace,
            service,
        } => commands::run(
            input.as_deref(),
            input_file.as_deref(),
            report.as_deref(),
            trace,
            &service,
        ),
        Commands::Layers { json, service } => commands::layers(json, &service),
        Commands::Batch { dir, out, service } => commands::batch(&dir, &out, &service),
    }
}
