use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "changeline",
    about = "Changeline: change tracking and replication for record stores",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON snapshot of the store to operate on
    #[arg(short, long, global = true, default_value = "changeline.json")]
    pub store: PathBuf,

    /// Replication config (TOML) declaring tracked models
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the current checkpoint, or open a new one
    Checkpoint(CheckpointArgs),
    /// Write a record and rectify its change
    Put(PutArgs),
    /// Delete a record, leaving a tombstone change
    Delete(DeleteArgs),
    /// Start tracking existing records
    Track(TrackArgs),
    /// List changes of a model
    Changes(ChangesArgs),
    /// Replicate a model from one store to another
    Replicate(ReplicateArgs),
}

#[derive(Args)]
pub struct CheckpointArgs {
    #[arg(long)]
    pub bump: bool,
    /// Recorded on the new checkpoint
    #[arg(long, requires = "bump")]
    pub source_id: Option<String>,
}

#[derive(Args)]
pub struct PutArgs {
    pub model: String,
    pub id: String,
    /// Record fields as a JSON object
    pub json: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub model: String,
    pub id: String,
}

#[derive(Args)]
pub struct TrackArgs {
    pub model: String,
    pub ids: Vec<String>,
    /// Rectify every record and change of the model
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,
}

#[derive(Args)]
pub struct ChangesArgs {
    pub model: String,
    /// Only changes after this checkpoint
    #[arg(long)]
    pub since: Option<u64>,
}

#[derive(Args)]
pub struct ReplicateArgs {
    #[arg(long)]
    pub source: PathBuf,
    #[arg(long)]
    pub target: PathBuf,
    #[arg(long)]
    pub model: String,
    /// Advance the watermark past conflicts
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// Settle reported conflicts in favour of one side
    #[arg(long)]
    pub resolve: Option<Resolution>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Resolution {
    Source,
    Target,
}
