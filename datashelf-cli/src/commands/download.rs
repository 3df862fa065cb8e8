//! Download command - fetch datasets described by manifests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgGroup, Args};
use datashelf::manifest::{read_manifest, read_presigned};
use datashelf::store::AddressResolver;
use datashelf::transfer::{BatchOptions, BatchOrchestrator, BatchResult, VerifyMode};
use datashelf::ShelfError;
use tracing::{info, warn};

use crate::error::CliError;
use crate::output::download_summary;
use crate::progress::ProgressObserver;
use crate::runner::CliRunner;

/// Arguments for the download command.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["manifest", "dataset", "all"])))]
pub struct DownloadArgs {
    /// Presigned manifest (JSON) to download
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Dataset to download (signed in memory, or via the public URL)
    #[arg(long)]
    pub dataset: Option<String>,

    /// Download every dataset with a manifest
    #[arg(long)]
    pub all: bool,

    /// Destination root (default: the datasets dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Skip checksum and size verification
    #[arg(long)]
    pub no_verify: bool,

    /// Trust existing files whose size matches, without hashing them
    #[arg(long)]
    pub fast_resume: bool,

    /// Skip the first N manifest entries
    #[arg(long, value_name = "N", default_value_t = 0, conflicts_with = "all")]
    pub start_from: usize,

    /// Parallel downloads (1 = sequential, in manifest order)
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Failure log path (default <output-dir>/failed_downloads.log)
    #[arg(long)]
    pub failure_log: Option<PathBuf>,
}

/// Run the download command.
pub fn run(runner: &CliRunner, args: DownloadArgs) -> Result<(), CliError> {
    runner.log_startup("download");
    let config = runner.config();

    let verify_mode = if args.no_verify || args.fast_resume {
        VerifyMode::from_flags(args.no_verify, args.fast_resume)
    } else {
        config.transfer.verify
    };
    let destination = args
        .output_dir
        .clone()
        .unwrap_or_else(|| runner.layout().datasets_dir.clone());

    let mut options = BatchOptions::new(&destination)
        .with_verify_mode(verify_mode)
        .with_concurrency(args.concurrency.unwrap_or(config.transfer.concurrency))
        .with_start_index(args.start_from);
    if let Some(log) = &args.failure_log {
        options = options.with_failure_log(log);
    }

    let result = match (&args.manifest, &args.dataset) {
        (Some(path), _) => {
            let payload = read_presigned(path)?;
            info!(
                manifest = %path.display(),
                files = payload.entries.len(),
                bytes = payload.total_bytes(),
                "Loaded presigned manifest"
            );
            let progress = Arc::new(ProgressObserver::new(
                payload.entries.len().saturating_sub(args.start_from),
            ));
            let orchestrator =
                BatchOrchestrator::new(runner.fetcher()?).with_observer(progress.clone());
            let result = orchestrator.run(&payload, &options);
            progress.finish();
            result?
        }
        (None, Some(name)) => {
            let resolver = runner.address_resolver()?;
            download_dataset(runner, resolver.as_ref(), name, &options)?
        }
        (None, None) => download_all(runner, &options)?,
    };

    report(&result)
}

/// Resolve addresses for one dataset manifest in memory and download it.
fn download_dataset(
    runner: &CliRunner,
    resolver: &dyn AddressResolver,
    name: &str,
    options: &BatchOptions,
) -> Result<BatchResult, CliError> {
    let manifest = read_manifest(&runner.layout().manifest_path(name))?;
    let progress = Arc::new(ProgressObserver::new(
        manifest.entries.len().saturating_sub(options.start_index),
    ));
    let orchestrator = BatchOrchestrator::new(runner.fetcher()?).with_observer(progress.clone());
    let ttl = Duration::from_secs(runner.config().transfer.expires_in);
    let result = orchestrator.run_manifest(&manifest, resolver, ttl, options);
    progress.finish();
    Ok(result?)
}

/// Download every dataset with a manifest, one batch per dataset.
///
/// Transport failures accumulate across datasets; an integrity error stops
/// the whole run.
fn download_all(runner: &CliRunner, options: &BatchOptions) -> Result<BatchResult, CliError> {
    let layout = runner.layout();
    let names = layout.list_datasets()?;
    if names.is_empty() {
        return Err(ShelfError::NotFound {
            what: "dataset manifests",
            path: layout.manifests_dir.clone(),
        }
        .into());
    }

    let resolver = runner.address_resolver()?;
    let mut total = BatchResult::default();
    for name in &names {
        info!(dataset = %name, "Downloading dataset");
        match download_dataset(runner, resolver.as_ref(), name, options) {
            Ok(result) => total.absorb(result),
            Err(CliError::Shelf(ShelfError::NotFound { path, .. })) => {
                warn!(path = %path.display(), "Manifest not found, skipping");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Print the summary; failed entries turn into a non-zero exit.
fn report(result: &BatchResult) -> Result<(), CliError> {
    println!("{}", download_summary(result));
    match &result.failure_log {
        Some(log) if result.has_failures() => Err(CliError::TransferFailures {
            failed: result.failed,
            log: log.clone(),
        }),
        _ => Ok(()),
    }
}
