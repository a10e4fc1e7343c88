//! # cairn CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cairn_cli::fetch::{run_fetch, FetchArgs};
use cairn_cli::get::{run_get, GetArgs};
use cairn_cli::list::{run_list, ListArgs};
use cairn_cli::put::{run_put, PutArgs};

/// Cairn block store CLI
///
/// Stores files as trees of content-addressed, optionally encrypted blocks
/// and reads them back through the link graph.
#[derive(Parser, Debug)]
#[command(name = "cairn", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Block directory; overrides `store.directory` from the config.
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk a file into blocks and store them.
    Put(PutArgs),

    /// Print the raw bytes of one block.
    Get(GetArgs),

    /// Walk the link graph below a root.
    Fetch(FetchArgs),

    /// List stored block names.
    List(ListArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match cairn_cli::load_config(cli.config.as_deref(), cli.store.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = match &cli.command {
        Commands::Put(args) => run_put(args, &config, &mut out),
        Commands::Get(args) => run_get(args, &config, &mut out),
        Commands::Fetch(args) => run_fetch(args, &config, &mut out),
        Commands::List(args) => run_list(args, &config, &mut out),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
