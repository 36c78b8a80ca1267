//! repovec - repository ingestion for semantic code search
//!
//! # Usage
//!
//! ```bash
//! # Ingest every repository from the config file
//! repovec ingest --repos-config repos.yaml
//!
//! # Resume an interrupted run (the default)
//! repovec ingest
//!
//! # Search a collection
//! repovec search "token verification" --language rust
//!
//! # Checkpoint and collection status
//! repovec status
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// repovec - ingest repositories into a vector store and search them
#[derive(Parser, Debug)]
#[command(name = "repovec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Vector backend to use (managed, local)
    #[arg(long, global = true, env = "VECTOR_BACKEND")]
    backend: Option<String>,

    /// Path to the repositories config file
    #[arg(long, global = true, env = "REPOVEC_REPOS_CONFIG")]
    repos_config: Option<PathBuf>,

    /// Path to the collections config file
    #[arg(long, global = true, env = "REPOVEC_COLLECTIONS_CONFIG")]
    collections_config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest repositories into the vector store
    Ingest(commands::ingest::IngestArgs),

    /// Semantic search over ingested collections
    Search(commands::search::SearchArgs),

    /// Checkpoint and collection status
    Status(commands::status::StatusArgs),

    /// Show the resolved collection map
    Collections(commands::collections::CollectionsArgs),
}

fn init_tracing(global: &GlobalOptions) {
    let default_level = if global.verbose {
        "debug"
    } else if global.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("repovec={0},repovec_cli={0}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    match cli.command {
        Commands::Ingest(args) => commands::ingest::run(&cli.global, args).await,
        Commands::Search(args) => commands::search::run(&cli.global, args).await,
        Commands::Status(args) => commands::status::run(&cli.global, args).await,
        Commands::Collections(args) => commands::collections::run(&cli.global, args).await,
    }
}
