//! Datashelf CLI - command-line interface
//!
//! Builds dataset manifests, publishes presigned manifests and moves dataset
//! files between local disk and an S3-compatible object store.

mod commands;
mod error;
mod output;
mod progress;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use commands::build::BuildArgs;
use commands::download::DownloadArgs;
use commands::presign::PresignArgs;
use commands::resume_point::ResumePointArgs;
use commands::upload::UploadArgs;
use error::CliError;
use runner::{CliRunner, GlobalOptions};

#[derive(Debug, Parser)]
#[command(name = "datashelf", version, about = "Dataset manifests and verified transfers for R2")]
struct Cli {
    /// Config file (default <config_dir>/datashelf/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Root of the dataset tree (default ./datasets)
    #[arg(long, global = true, value_name = "DIR")]
    datasets_dir: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build manifests, inventories and media views
    Build(BuildArgs),
    /// Write presigned manifests for datasets
    Presign(PresignArgs),
    /// Download files listed in a manifest
    Download(DownloadArgs),
    /// Find the first entry not yet downloaded
    ResumePoint(ResumePointArgs),
    /// Upload datasets to the object store
    Upload(UploadArgs),
    /// List datasets with manifests
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let runner = CliRunner::new(&GlobalOptions {
        config: cli.config,
        datasets_dir: cli.datasets_dir,
        verbose: cli.verbose,
    })?;

    match cli.command {
        Commands::Build(args) => commands::build::run(&runner, args),
        Commands::Presign(args) => commands::presign::run(&runner, args),
        Commands::Download(args) => commands::download::run(&runner, args),
        Commands::ResumePoint(args) => commands::resume_point::run(&runner, args),
        Commands::Upload(args) => commands::upload::run(&runner, args),
        Commands::List => commands::list::run(&runner),
    }
}
