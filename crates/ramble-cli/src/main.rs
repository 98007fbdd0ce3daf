use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    expand::{self, ExpandArgs},
    setup::{self, SetupArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "ramble", about = "Ramble variable expansion and experiment assembly")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand a single template against command-line variables.
    Expand(ExpandArgs),
    /// Assemble every experiment of a workspace file and emit its manifest.
    Setup(SetupArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Expand(args) => expand::run(&args),
        Command::Setup(args) => setup::run(&args),
    }
}
