//! Parley CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write a default config file
//! - `run`      — Start the endpoints and the engine
//! - `history`  — Print recent stored messages
//! - `status`   — Show the resolved configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley — a conversational persona agent for group chats",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the endpoints and the engine
    Run,

    /// Print the most recent stored messages
    History {
        /// How many messages to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the resolved configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Run => commands::run::run().await?,
        Commands::History { limit } => commands::history::run(limit).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
