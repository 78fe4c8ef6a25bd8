//! WARGAME CLI - Command-line interface
//!
//! Commands:
//! - play: Play a single game (human and/or computer sides)
//! - match: Computer vs computer series between two heuristics

mod match_cmd;
mod play;
mod trace;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "wargame")]
#[command(about = "5x5 AI wargame with minimax / alpha-beta computer players")]
struct Cli {
    /// RNG seed for reproducible random openings
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single game
    Play(play::PlayArgs),
    /// Play a series of computer vs computer games
    Match(match_cmd::MatchArgs),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging (RUST_LOG overrides the default level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => play::run(args),
        Commands::Match(args) => match_cmd::run(args, cli.seed),
    }
}
