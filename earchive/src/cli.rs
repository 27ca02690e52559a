///
/// This module implements the CLI interface for earchive: command parsing, argument
/// definitions and the async entrypoint that maps every command to an [`ExitStatus`].
///
/// All manifest, metadata, certificate and batch logic lives in the [`earchive-core`] crate.
/// This module is CLI glue: it exposes arguments, loads configuration and routes commands.
///
/// ## Commands
/// - `send`: archive a single file with metadata given on the command line
/// - `sendfromcsv`: archive every row of a CSV manifest
/// - `listnodes`: print destination nodes and custom metadata fields
///
/// Every command takes `--certificate <serial>` and `--devel` (use the test environment).
///
/// For programmatic and integration use, call [`run`] with a constructed [`Cli`].
///
/// [`earchive-core`]: ../../earchive-core/
use crate::commands;
use crate::load_config::load_config;
use clap::{Args, Parser, Subcommand};
use earchive_core::batch::BatchOptions;
use earchive_core::exit_status::ExitStatus;
use std::path::PathBuf;

/// CLI for earchive: archive documents in a certificate-authenticated document archive.
#[derive(Debug, Parser)]
#[clap(
    name = "earchive",
    version,
    about = "Send documents with metadata to the document archive, one by one or from a CSV manifest"
)]
pub struct Cli {
    /// Path to the YAML config file (defaults to ./earchive.yaml when present)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log outgoing documents and other debug detail
    #[clap(long, global = true)]
    pub debug: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sends a file with some metadata to storage
    Send(SendArgs),
    /// Sends multiple files with some metadata to storage. List of files is read from CSV
    #[clap(name = "sendfromcsv")]
    SendFromCsv(SendFromCsvArgs),
    /// Lists nodes and custom metadata fields
    #[clap(name = "listnodes")]
    ListNodes(ConnectionArgs),
}

/// Options shared by every command that talks to the service.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Serial number of the client certificate used to connect to the server
    #[clap(short = 'c', long)]
    pub certificate: String,

    /// Connect to the test environment
    #[clap(short = 'd', long)]
    pub devel: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SendArgs {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    /// Input file
    #[clap(short = 'f', long)]
    pub file: PathBuf,

    /// Code of the node the document is stored in
    #[clap(long)]
    pub node: String,

    /// Document title
    #[clap(long)]
    pub naziv: String,

    /// Document code
    #[clap(long)]
    pub koda: String,

    /// Supplier name
    #[clap(long)]
    pub nazivdobavitelja: String,

    /// Supplier code
    #[clap(long)]
    pub sifradobavitelja: String,

    /// Supplier tax number
    #[clap(long)]
    pub davcnastevilkadobavitelja: String,

    /// Invoice number
    #[clap(long)]
    pub stevilkaracuna: String,

    /// Invoice date, YYYY-MM-DD (or year-day-month as in manifests)
    #[clap(long)]
    pub datumizdajeracuna: String,

    /// Year
    #[clap(long)]
    pub leto: i32,
}

#[derive(Debug, Clone, Args)]
pub struct SendFromCsvArgs {
    #[clap(flatten)]
    pub connection: ConnectionArgs,

    /// CSV file with list of documents
    #[clap(short = 'f', long)]
    pub file: Option<PathBuf>,
}

/// Log filter used when `RUST_LOG` is unset. `--debug` only raises this workspace's crates.
pub fn default_log_filter(debug: bool) -> &'static str {
    if debug {
        "info,earchive=debug,earchive_core=debug"
    } else {
        "info"
    }
}

/// Async CLI entrypoint for integration tests and main(). Never panics on user error; every
/// outcome is an [`ExitStatus`].
pub async fn run(cli: Cli) -> ExitStatus {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration could not be loaded");
            println!("ERROR: {e}");
            return ExitStatus::UsageError;
        }
    };

    let options = BatchOptions {
        log_documents: cli.debug,
    };
    let status = match cli.command {
        Commands::Send(args) => {
            tracing::info!(command = "send", file = %args.file.display(), "Starting single document submission");
            commands::send(&config, args, options).await
        }
        Commands::SendFromCsv(args) => {
            tracing::info!(command = "sendfromcsv", manifest = ?args.file, "Starting batch submission");
            commands::send_from_csv(&config, args, options).await
        }
        Commands::ListNodes(args) => {
            tracing::info!(command = "listnodes", "Starting listing");
            commands::list_nodes(&config, args).await
        }
    };

    if status.is_success() {
        tracing::info!(%status, "Command completed");
    } else {
        tracing::error!(%status, "Command finished with errors");
    }
    println!("All done.");
    status
}
