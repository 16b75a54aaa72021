//! Unified warden CLI.
//!
//! - `warden match` - Show which rules match a URL
//! - `warden fetch` - Fetch a URL through the resilient transport stack

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use warden::cli::{FetchArgs, MatchArgs};

/// warden CLI.
#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Rule matching and resilient fetching core of a filtering web proxy",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the rules matching each URL.
    #[command(name = "match")]
    Match(MatchArgs),

    /// Fetch a URL and stream the body to stdout.
    #[command(name = "fetch", alias = "get")]
    Fetch(Box<FetchArgs>),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Match(args) => warden::cli::run_match(args).await,
        Commands::Fetch(args) => warden::cli::run_fetch(*args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
