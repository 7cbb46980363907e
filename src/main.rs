//! natsvisor - supervises one clustered NATS server per node.
//!
//! This is the main entry point for the natsvisor CLI. It provides commands for:
//!
//! - Running the supervision loop (`natsvisor run`)
//! - Previewing the rendered configuration (`natsvisor render`)
//! - Inspecting discovered peers (`natsvisor peers`)
//! - Printing this node's registration payload (`natsvisor endpoints`)
//!
//! See `natsvisor --help` for full usage information.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

const AFTER_HELP: &str = "\
EXAMPLES:
  natsvisor run                              Supervise using ./natsvisor.toml
  natsvisor run -c /etc/natsvisor.toml -r 3  Override the replica id
  natsvisor render                           Print the config the next launch would use
  natsvisor peers --json                     Show resolved peers for scripting
  natsvisor endpoints                        Print the registration payload";

#[derive(Parser)]
#[command(name = "natsvisor")]
#[command(version)]
#[command(about = "Render, launch and keep alive a clustered NATS server")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = natsvisor::constants::CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Enable verbose/debug output for any command
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the supervision loop until SIGTERM or Ctrl+C
    ///
    /// Discovers peers, renders the configuration, launches the server and
    /// restarts it with a fresh peer list whenever it exits.
    Run {
        /// Replica id (overrides [node].replica_id)
        #[arg(short, long)]
        replica: Option<String>,
    },
    /// Discover peers once and print the rendered configuration
    ///
    /// Nothing is written or launched.
    Render {
        /// Replica id (overrides [node].replica_id)
        #[arg(short, long)]
        replica: Option<String>,
    },
    /// Resolve and print peer cluster addresses
    Peers {
        /// Output as JSON for scripting and automation
        #[arg(long)]
        json: bool,
    },
    /// Print the endpoint payload this node registers
    Endpoints,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { replica } => {
            let config = commands::load_config(&cli.config, replica, cli.verbose)?;
            commands::run::execute(&config).await?;
        },
        Commands::Render { replica } => {
            let config = commands::load_config(&cli.config, replica, cli.verbose)?;
            commands::render::execute(&config).await?;
        },
        Commands::Peers { json } => {
            let config = commands::load_config(&cli.config, None, cli.verbose)?;
            commands::peers::execute(&config, json).await?;
        },
        Commands::Endpoints => {
            let config = commands::load_config(&cli.config, None, cli.verbose)?;
            commands::endpoints::execute(&config)?;
        },
    }

    Ok(())
}
