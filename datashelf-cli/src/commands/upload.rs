//! Upload command - push datasets to the object store.

use std::sync::Arc;

use clap::{ArgGroup, Args};
use datashelf::transfer::{UploadOptions, Uploader};
use datashelf::ShelfError;

use crate::error::CliError;
use crate::output::{upload_summary, ConsoleOutput, Output};
use crate::progress::ProgressObserver;
use crate::runner::CliRunner;

/// Arguments for the upload command.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("target").required(true).args(["dataset", "all"])))]
pub struct UploadArgs {
    /// Dataset to upload
    #[arg(long)]
    pub dataset: Option<String>,

    /// Upload every dataset with a manifest
    #[arg(long)]
    pub all: bool,

    /// Do not backfill missing hashes into the manifest
    #[arg(long)]
    pub no_update_manifest: bool,
}

/// Run the upload command.
pub fn run(runner: &CliRunner, args: UploadArgs) -> Result<(), CliError> {
    runner.log_startup("upload");
    let layout = runner.layout();
    let store = runner.object_store()?;

    let names = match &args.dataset {
        Some(name) => vec![name.clone()],
        None => layout.list_datasets()?,
    };
    if names.is_empty() {
        return Err(ShelfError::NotFound {
            what: "dataset manifests",
            path: layout.manifests_dir.clone(),
        }
        .into());
    }

    let options = UploadOptions::default().with_update_manifest(!args.no_update_manifest);
    let out = ConsoleOutput;
    let mut failed = 0;
    let mut last_log = None;

    for name in &names {
        let progress = Arc::new(ProgressObserver::unbounded());
        let uploader = Uploader::new(store.clone()).with_observer(progress.clone());
        let result = uploader.upload_dataset(layout, name, &options);
        progress.finish();
        let result = result?;

        out.println(&upload_summary(name, &result));
        failed += result.failed;
        if result.failure_log.is_some() {
            last_log = result.failure_log;
        }
    }

    match last_log {
        Some(log) if failed > 0 => Err(CliError::TransferFailures { failed, log }),
        _ => Ok(()),
    }
}
