//! Unified flotilla CLI.
//!
//! - `flotilla manager` - Run the fleet manager (the control plane)
//!
//! The manager owns the authoritative fleet state, renders engine configs,
//! pushes them to nodes, and aggregates usage counters.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod manager;

/// Flotilla unified CLI.
#[derive(Parser)]
#[command(
    name = "flotilla",
    version,
    about = "Control plane for a multi-node proxy fleet",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fleet manager.
    #[command(name = "manager", alias = "run")]
    Manager(manager::ManagerArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result: Result<(), String> = match cli.command {
        Commands::Manager(args) => manager::run(args).await.map_err(|e| e.to_string()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
