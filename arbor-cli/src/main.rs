//! # arbor CLI
//!
//! Drives the demo store from the command line and prints state as JSON.

mod commands;
mod demo;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "arbor.yml")]
    config: PathBuf,

    /// Report state writes made outside a mutation
    #[arg(long)]
    strict: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the root state
    State {
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print every root getter and its current value
    Getters {
        /// Only getters of this namespace (e.g. "a/")
        #[arg(long)]
        namespace: Option<String>,

        #[arg(long)]
        pretty: bool,
    },

    /// Commit a mutation and print the resulting state
    Commit {
        /// Mutation type, e.g. "add" or "a/add"
        #[arg(value_name = "TYPE")]
        kind: String,

        /// JSON payload (defaults to null)
        payload: Option<String>,

        /// Mark the commit as silent (deprecated, ignored)
        #[arg(long)]
        silent: bool,

        #[arg(long)]
        pretty: bool,
    },

    /// Dispatch an action, wait for it and print its result and the state
    Dispatch {
        /// Action type, e.g. "addFun" or "a/addFun"
        #[arg(value_name = "TYPE")]
        kind: String,

        /// JSON payload (defaults to null)
        payload: Option<String>,

        #[arg(long)]
        pretty: bool,
    },

    /// Run a YAML file of commit/dispatch steps against a fresh store
    Replay {
        /// Steps file
        file: PathBuf,

        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::WARN.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let session = demo::Session::open(&cli.config, cli.strict)?;

    match cli.command {
        Commands::State { pretty } => commands::print_state(&session, pretty),
        Commands::Getters { namespace, pretty } => {
            commands::print_getters(&session, namespace.as_deref(), pretty)
        }
        Commands::Commit {
            kind,
            payload,
            silent,
            pretty,
        } => commands::commit(&session, &kind, payload.as_deref(), silent, pretty),
        Commands::Dispatch {
            kind,
            payload,
            pretty,
        } => commands::dispatch(&session, &kind, payload.as_deref(), pretty).await,
        Commands::Replay { file, pretty } => commands::replay(&session, &file, pretty).await,
    }
}
