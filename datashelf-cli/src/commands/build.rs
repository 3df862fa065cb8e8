//! Build command - write manifests, inventories and media views.

use clap::Args;
use datashelf::layout::build_all;
use datashelf::manifest::BuildOptions;
use datashelf::ShelfError;

use crate::error::CliError;
use crate::output::{format_size, ConsoleOutput, Output};
use crate::runner::CliRunner;

/// Arguments for the build command.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Compute SHA-256 for every file (slower)
    #[arg(long)]
    pub hash: bool,

    /// Datasets to build; defaults to every directory under the datasets dir
    #[arg(value_name = "DATASET")]
    pub datasets: Vec<String>,
}

/// Run the build command.
pub fn run(runner: &CliRunner, args: BuildArgs) -> Result<(), CliError> {
    runner.log_startup("build");
    let layout = runner.layout();
    if !layout.datasets_dir.is_dir() {
        return Err(ShelfError::NotFound {
            what: "datasets directory",
            path: layout.datasets_dir.clone(),
        }
        .into());
    }

    let options = BuildOptions::default().with_hash(args.hash);
    let report = build_all(layout, &args.datasets, &options)?;

    for name in &report.missing {
        eprintln!("Skip non-dir dataset: {}", name);
    }

    let out = ConsoleOutput;
    out.header("Manifests");
    for entry in &report.built {
        out.indented(&format!(
            "{:<24} {:>8} files {:>12}{}",
            entry.dataset,
            entry.file_count,
            format_size(entry.total_bytes),
            if entry.hashed { "  sha256" } else { "" }
        ));
    }
    out.newline();
    out.println(&format!("Index:       {}", layout.index_path().display()));
    out.println(&format!("Media index: {}", layout.media_index_path().display()));
    Ok(())
}
