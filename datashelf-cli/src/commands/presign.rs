//! Presign command - publish manifests with fetch addresses.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::{ArgGroup, Args};
use datashelf::manifest::io::write_json;
use datashelf::manifest::{build_bundle, presign_manifest, read_manifest};
use datashelf::ShelfError;
use tracing::warn;

use crate::error::CliError;
use crate::output::{ConsoleOutput, Output};
use crate::runner::CliRunner;

/// Arguments for the presign command.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("target").required(true).args(["dataset", "all"])))]
pub struct PresignArgs {
    /// Dataset to presign
    #[arg(long)]
    pub dataset: Option<String>,

    /// Presign every dataset with a manifest
    #[arg(long)]
    pub all: bool,

    /// Lifetime of each URL in seconds (default from config, 7 days)
    #[arg(long)]
    pub expires_in: Option<u64>,

    /// Output path; only used with --dataset
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Also write one bundle manifest covering every dataset
    #[arg(long)]
    pub bundle: Option<String>,

    /// Bundle output path (default presigned/<bundle>.public.json)
    #[arg(long, requires = "bundle")]
    pub bundle_output: Option<PathBuf>,
}

/// Run the presign command.
pub fn run(runner: &CliRunner, args: PresignArgs) -> Result<(), CliError> {
    runner.log_startup("presign");
    let layout = runner.layout();
    let ttl = Duration::from_secs(
        args.expires_in
            .unwrap_or(runner.config().transfer.expires_in),
    );
    let resolver = runner.address_resolver()?;

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

    let now = Utc::now();
    let mut payloads = Vec::new();
    let mut written = Vec::new();

    for name in &names {
        let manifest_path = layout.manifest_path(name);
        let manifest = match read_manifest(&manifest_path) {
            Ok(manifest) => manifest,
            Err(ShelfError::NotFound { path, .. }) if names.len() > 1 => {
                warn!(path = %path.display(), "Manifest not found, skipping");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let payload = presign_manifest(&manifest, resolver.as_ref(), ttl, now)?;
        let output = match (&args.output, args.dataset.is_some()) {
            (Some(path), true) => path.clone(),
            _ => layout.presigned_path(name),
        };
        write_json(&output, &payload)?;
        written.push(output);
        payloads.push(payload);
    }

    if let Some(bundle_name) = &args.bundle {
        if !payloads.is_empty() {
            let bundle = build_bundle(bundle_name, &payloads, now, ttl)?;
            let output = args
                .bundle_output
                .clone()
                .unwrap_or_else(|| layout.presigned_path(bundle_name));
            write_json(&output, &bundle)?;
            written.push(output);
        }
    }

    if written.is_empty() {
        return Err(ShelfError::NotFound {
            what: "dataset manifests",
            path: layout.manifests_dir.clone(),
        }
        .into());
    }

    let out = ConsoleOutput;
    out.header("Generated presigned manifests:");
    for path in &written {
        out.indented(&format!("- {}", path.display()));
    }
    Ok(())
}

