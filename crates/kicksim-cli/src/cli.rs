use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "kicksim-cli")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,

    #[clap(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Also write JSON logs to this file. `auto` picks a file in the local
    /// data directory.
    #[clap(long, global = true)]
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a match with scripted robots.
    #[clap(name = "run")]
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Simulated duration in seconds
    #[clap(long, default_value = "10.0")]
    pub duration: f64,

    /// Length of one tick in milliseconds
    #[clap(long, default_value = "10")]
    pub tick_ms: u64,

    /// Overrides the seed of the setup
    #[clap(long)]
    pub seed: Option<u64>,

    /// JSON file with the simulator setup. Missing fields take their defaults.
    #[clap(long)]
    pub setup: Option<PathBuf>,

    /// Write released vision packets, errors and the final state as JSON lines
    #[clap(long)]
    pub record: Option<PathBuf>,

    /// Tick at wall clock speed until the duration passes or Ctrl-C
    #[clap(long, default_value = "false", action)]
    pub realtime: bool,

    /// Start with the sides of the teams swapped
    #[clap(long, default_value = "false", action)]
    pub flip: bool,
}
