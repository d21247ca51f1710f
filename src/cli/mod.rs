//! CLI Module
//!
//! Command-line interface for the DAX layer pipeline.

pub mod commands;
pub mod report;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub use report::RunReport;

/// DAX - recursive layer stabilization over a chat-completions service
#[derive(Parser, Debug)]
#[command(name = "dax")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings shared by every command that talks to the service
#[derive(Args, Debug, Clone, Default)]
pub struct ServiceArgs {
    /// API key (defaults to DAX_API_KEY / XAI_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Model identifier (defaults to DAX_MODEL or grok-4)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Chat completions endpoint (defaults to DAX_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Layer registry file (defaults to DAX_LAYERS_PATH or the built-in layers)
    #[arg(long)]
    pub layers: Option<PathBuf>,

    /// JSON file of per-layer overrides keyed by layer id
    #[arg(short, long)]
    pub overrides: Option<PathBuf>,

    /// Require a JSON {output, reason} reply from every layer
    #[arg(short, long)]
    pub audit: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one text through every layer
    #[command(name = "run")]
    Run {
        /// Text to transform
        #[arg(short, long, conflicts_with = "input_file", required_unless_present = "input_file")]
        input: Option<String>,

        /// Read the text to transform from a file
        #[arg(short = 'f', long)]
        input_file: Option<PathBuf>,

        /// Write a JSON run report to this path
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Print every layer's output, not just the final text
        #[arg(short, long)]
        trace: bool,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Show the effective layer list
    #[command(name = "layers")]
    Layers {
        /// Print as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Run every *.txt file under a directory, one report per input
    #[command(name = "batch")]
    Batch {
        /// Directory of input files
        dir: PathBuf,

        /// Directory for reports
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        service: ServiceArgs,
    },
}
