use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "colrec",
    about = "colrec: record JSON message streams into typed columnar artifacts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record NDJSON `{"topic", "message"}` lines from stdin
    Record(RecordArgs),
    /// Show the groups and datasets of an artifact
    Inspect(InspectArgs),
    /// Validate a recorder configuration file
    CheckConfig(CheckConfigArgs),
}

#[derive(Args)]
pub struct RecordArgs {
    /// Recorder configuration (.toml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the output folder
    #[arg(long)]
    pub folder: Option<PathBuf>,
}

#[derive(Args)]
pub struct InspectArgs {
    pub path: PathBuf,
    /// Print up to this many rows of every dataset
    #[arg(long, default_value = "0")]
    pub rows: usize,
}

#[derive(Args)]
pub struct CheckConfigArgs {
    pub path: PathBuf,
}
