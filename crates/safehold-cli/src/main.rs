//! Safehold CLI
//!
//! Command-line interface for the Safehold safety envelope

use clap::{Parser, Subcommand};

use safehold_core::logging_facility::{self, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "safehold")]
#[command(about = "Safehold - verified mutations for a live world model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Policy operations (check an action, show loaded rules)
    Policy(commands::policy::PolicyArgs),
    /// Snapshot operations (capture and diff)
    Snapshot(commands::snapshot::SnapshotArgs),
    /// Route one command through the safety envelope
    Route(commands::route::RouteArgs),
}

fn main() {
    logging_facility::init(Profile::Production);
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Policy(args) => commands::policy::execute(args),
        Commands::Snapshot(args) => commands::snapshot::execute(args),
        Commands::Route(args) => commands::route::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
