//! Storyloom CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Initialize config & story workspace
//! - `status`   — Show store status and stats
//! - `validate` — Check tree structure and blob consistency
//! - `show`     — Print the tree outline (or one node)
//! - `context`  — Assemble generation context for a node

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "storyloom",
    about = "Storyloom — persistent story tree for human/agent co-writing",
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
    /// Initialize configuration and the story workspace
    Init,

    /// Show store status and stats
    Status,

    /// Check tree structure and node/blob consistency
    Validate,

    /// Print the tree outline, or one node's content
    Show {
        /// Show a single node (title, metadata, content) instead of the outline
        #[arg(short, long)]
        node: Option<String>,
    },

    /// Assemble generation context for a node
    Context {
        /// The node id to assemble context around
        id: String,

        /// Emit JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
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
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Validate => commands::validate_cmd::run().await?,
        Commands::Show { node } => commands::show::run(node).await?,
        Commands::Context { id, json } => commands::context_cmd::run(&id, json).await?,
    }

    Ok(())
}
