use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "abidiff",
    about = "Incremental ABI diffs of build artifacts",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with a `[cache]` table
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build an artifact from a directory of JSON class nodes
    Pack(PackArgs),
    /// List the node index of an artifact
    Index(IndexArgs),
    /// Store an artifact version in a history directory
    Record(RecordArgs),
    /// Show added, changed and deleted classes of an artifact
    Diff(DiffArgs),
}

#[derive(Args)]
pub struct PackArgs {
    pub dir: PathBuf,
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct IndexArgs {
    pub jar: PathBuf,
}

#[derive(Args)]
pub struct RecordArgs {
    pub jar: PathBuf,
    #[arg(long)]
    pub history: PathBuf,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Current version of the artifact
    pub new: PathBuf,
    /// Previous version, as a file
    #[arg(long, conflicts_with_all = ["history", "old_digest"])]
    pub old: Option<PathBuf>,
    /// History directory holding the previous version
    #[arg(long, requires = "old_digest")]
    pub history: Option<PathBuf>,
    /// Digest of the previous version inside `--history`
    #[arg(long, requires = "history")]
    pub old_digest: Option<String>,
}
