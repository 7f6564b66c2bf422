//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: run a number of shifts against the simulated factory task
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Director - one persistent brain supervising disposable workers
#[derive(Parser, Debug)]
#[command(name = "director")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run shifts of disposable workers
    Run(RunArgs),

    /// Print the effective configuration as YAML
    Config,
}

/// Arguments for `run`. Unset values fall back to the config file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Number of shifts to run
    #[arg(short = 'n', long)]
    pub shifts: Option<u64>,

    /// Workers spawned per shift
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Fraction of each shift flagged as canaries
    #[arg(long)]
    pub canary_ratio: Option<f64>,

    /// Task description handed to every worker
    #[arg(short, long)]
    pub task: Option<String>,

    /// Enable experimental knowledge before the first shift
    #[arg(short, long)]
    pub experimental: bool,

    /// Toggle experimental knowledge before these shift numbers
    #[arg(long = "toggle-at", value_name = "SHIFT")]
    pub toggle_at: Vec<u64>,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip simulated work durations
    #[arg(long)]
    pub instant: bool,

    /// Emit one JSON object per shift instead of colored text
    #[arg(long)]
    pub json: bool,
}
