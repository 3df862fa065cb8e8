//! Resume-point command - find where an interrupted download stopped.

use std::path::PathBuf;

use clap::Args;
use datashelf::manifest::read_presigned;
use datashelf::transfer::find_resume_point;

use crate::error::CliError;
use crate::output::{ConsoleOutput, Output};
use crate::runner::CliRunner;

/// Arguments for the resume-point command.
#[derive(Debug, Args)]
pub struct ResumePointArgs {
    /// Presigned manifest (JSON)
    #[arg(long)]
    pub manifest: PathBuf,

    /// Destination root used for the download (default: the datasets dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Run the resume-point command.
pub fn run(runner: &CliRunner, args: ResumePointArgs) -> Result<(), CliError> {
    let payload = read_presigned(&args.manifest)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| runner.layout().datasets_dir.clone());

    let total = payload.entries.len();
    let resume = find_resume_point(&payload, &output_dir)?;

    let out = ConsoleOutput;
    if resume >= total {
        out.println(&format!("All {} files are already downloaded!", total));
        return Ok(());
    }

    out.println(&format!("Resume point: {}", resume));
    out.println(&format!(
        "Progress: {}/{} files already downloaded ({:.1}%)",
        resume,
        total,
        resume as f64 / total as f64 * 100.0
    ));
    out.println(&format!("Remaining: {} files", total - resume));
    out.newline();
    out.println("To resume download, use:");
    out.indented(&format!(
        "datashelf download --manifest {} --output-dir {} --fast-resume --start-from {}",
        args.manifest.display(),
        output_dir.display(),
        resume
    ));
    Ok(())
}
