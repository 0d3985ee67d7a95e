use clap::{Parser, Subcommand};
use std::process;
use tracing::error;

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute and print the scoreboard for a session file
    Score(cmd::score::ScoreArgs),
    /// Audit a template's columns and formulas
    Validate(cmd::validate::ValidateArgs),
    /// Normalize legacy template files to the current shape
    Migrate(cmd::migrate::MigrateArgs),
    /// Roll a random session against a template and score it
    Simulate(cmd::simulate::SimulateArgs),
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score(args) => cmd::score::run(args),
        Commands::Validate(args) => cmd::validate::run(args),
        Commands::Migrate(args) => cmd::migrate::run(args),
        Commands::Simulate(args) => cmd::simulate::run(args),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
