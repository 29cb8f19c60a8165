//! appsnap command-line tool
//!
//! Inspects, probes, writes and appends application snapshots.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "APPSNAP_LOG";

#[derive(Parser)]
#[command(name = "appsnap")]
#[command(about = "Application snapshot tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Log loader decisions at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// When to use colors: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a snapshot and describe its regions
    Inspect {
        /// Path or file: URI of the snapshot or host executable
        uri: String,
        /// Copy the payload into memory instead of mapping it
        #[arg(long)]
        in_memory: bool,
        /// Use the input as a path verbatim
        #[arg(long)]
        no_decode: bool,
        /// TOML file with load options
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Report the container format of a file and where its payload sits
    Probe {
        /// File to probe
        path: PathBuf,
    },

    /// Write a bare AppJIT snapshot from region files
    Write {
        /// Output snapshot path
        output: PathBuf,
        /// File holding the isolate data region
        #[arg(long)]
        isolate_data: PathBuf,
        /// File holding the isolate instructions region
        #[arg(long)]
        isolate_instructions: Option<PathBuf>,
    },

    /// Append a snapshot to a host executable
    Append {
        /// Host executable (Mach-O, PE or ELF)
        container: PathBuf,
        /// Snapshot payload to append
        payload: PathBuf,
        /// Output executable path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let color = output::resolve_color_choice(cli.color.as_deref());

    match cli.command {
        Commands::Inspect {
            uri,
            in_memory,
            no_decode,
            config,
        } => {
            let options = config::load_options(config.as_deref(), in_memory, no_decode)?;
            commands::inspect::execute(&uri, &options, color)
        }
        Commands::Probe { path } => commands::probe::execute(&path, color),
        Commands::Write {
            output,
            isolate_data,
            isolate_instructions,
        } => commands::write::execute(&output, &isolate_data, isolate_instructions.as_deref(), color),
        Commands::Append {
            container,
            payload,
            output,
        } => commands::append::execute(&container, &payload, &output, color),
    }
}
