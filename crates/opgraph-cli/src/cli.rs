use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "opgraph",
    about = "opgraph: import and inspect project configuration snapshots",
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

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write an empty project snapshot
    Init(InitArgs),
    /// Pre-flight an archive against a project without changing it
    Validate(ValidateArgs),
    /// Import an archive into a project snapshot
    Import(ImportArgs),
    /// Report relationship invariant violations in a snapshot
    Check(ProjectArgs),
    /// Print the directory and section trees of a snapshot
    Show(ProjectArgs),
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Project snapshot (JSON)
    #[arg(long)]
    pub project: PathBuf,
}

#[derive(Args)]
pub struct InitArgs {
    #[arg(long)]
    pub project: PathBuf,
    /// Project id; a fresh one is minted when absent
    #[arg(long)]
    pub id: Option<String>,
}

/// Where an import comes from and how it is configured.
#[derive(Args)]
pub struct SourceArgs {
    /// Root of an unpacked archive
    #[arg(long)]
    pub archive: PathBuf,
    /// Replacement map overriding the one shipped with the archive
    #[arg(long)]
    pub replacements: Option<PathBuf>,
    /// Import configuration (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[arg(long)]
    pub project: PathBuf,
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args)]
pub struct ImportArgs {
    #[arg(long)]
    pub project: PathBuf,
    #[command(flatten)]
    pub source: SourceArgs,
    /// Blob store root directory
    #[arg(long)]
    pub blobs: PathBuf,
    /// Fixed conflict token instead of one minted from the clock
    #[arg(long)]
    pub token: Option<String>,
    /// Write the result here instead of over the project snapshot
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
