//! Command-line front end for digitizing voter registration forms.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{AppendArgs, ExportArgs, ExtractArgs, ShowArgs};

/// Read registration forms into validated records and collect them in sheets
#[derive(Parser)]
#[command(name = "voterform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Pipeline config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a record from a form image or already-recognized text
    Extract(ExtractArgs),

    /// Validate a record and append it to a sheet
    Append(AppendArgs),

    /// Export a sheet as CSV
    Export(ExportArgs),

    /// Print a sheet's rows
    Show(ShowArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Extract(args) => commands::extract(args, cli.config.as_deref()).await,
        Commands::Append(args) => commands::append(args),
        Commands::Export(args) => commands::export(args),
        Commands::Show(args) => commands::show(args),
    }
}
