//! Wharf CLI - the build-protocol frontend for the wharf backend.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("wharf=debug")
    } else {
        EnvFilter::new("wharf=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match cli.command {
        Commands::Metadata(args) => commands::metadata::execute(args),
        Commands::Wheel(args) => commands::wheel::execute(args),
        Commands::Sdist(args) => commands::sdist::execute(args),
        Commands::Requires(args) => commands::requires::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
