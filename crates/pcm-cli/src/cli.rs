use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pcm", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a rolling-horizon scenario
    Run {
        /// Scenario TOML file
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
        /// Carried state (JSON) to start from instead of the case defaults
        #[arg(long, value_hint = ValueHint::FilePath)]
        initial_state: Option<PathBuf>,
        /// Output directory (defaults to the scenario's `output_dir`)
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        out: Option<PathBuf>,
    },
    /// Load and validate a scenario without solving it
    Check {
        /// Scenario TOML file
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// List the LP solvers compiled into this binary
    Solvers,
}

/// Command-line settings that win over the scenario file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Hours per interval
    #[arg(long)]
    pub interval_length: Option<usize>,
    /// Number of intervals
    #[arg(long)]
    pub n_interval: Option<usize>,
    /// First hour to simulate (1-based profile row)
    #[arg(long)]
    pub start_index: Option<usize>,
    /// Threads the LP solver may use
    #[arg(long)]
    pub threads: Option<usize>,
    /// LP solver (clarabel, highs)
    #[arg(long)]
    pub solver: Option<String>,
}
