//! List command - show datasets with manifests.

use datashelf::manifest::read_manifest;

use crate::error::CliError;
use crate::output::{format_size, ConsoleOutput, Output};
use crate::runner::CliRunner;

/// Run the list command.
pub fn run(runner: &CliRunner) -> Result<(), CliError> {
    let layout = runner.layout();
    let names = layout.list_datasets()?;
    let out = ConsoleOutput;

    if names.is_empty() {
        out.println(&format!(
            "No dataset manifests in {}",
            layout.manifests_dir.display()
        ));
        return Ok(());
    }

    out.header("Available datasets:");
    for name in &names {
        match read_manifest(&layout.manifest_path(name)) {
            Ok(manifest) => out.indented(&format!(
                "- {:<24} {:>8} files {:>12}  {} pending",
                name,
                manifest.summary.file_count,
                format_size(manifest.summary.total_bytes),
                manifest.pending_count()
            )),
            Err(e) => out.indented(&format!("- {:<24} (unreadable: {})", name, e)),
        }
    }
    Ok(())
}
