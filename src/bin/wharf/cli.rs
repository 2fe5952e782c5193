//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Wharf - a monorepo build backend
#[derive(Parser)]
#[command(name = "wharf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the distribution's metadata directory
    Metadata(MetadataArgs),

    /// Build a wheel
    Wheel(WheelArgs),

    /// Build a source distribution
    Sdist(SdistArgs),

    /// Print the requirements needed to perform a build
    Requires(RequiresArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct MetadataArgs {
    /// Directory to write the metadata directory into
    pub target_dir: PathBuf,

    /// Project root (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Args)]
pub struct WheelArgs {
    /// Directory to place the wheel in
    pub target_dir: PathBuf,

    /// Project root (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Emit path redirections instead of copying member sources
    #[arg(long)]
    pub editable: bool,

    /// Metadata directory from a previous `metadata` invocation
    #[arg(long)]
    pub metadata_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct SdistArgs {
    /// Directory to place the sdist in
    pub target_dir: PathBuf,

    /// Project root (defaults to the current directory)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Args)]
pub struct RequiresArgs {
    /// Artifact kind: wheel, sdist, or editable
    pub kind: String,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
