//! Command line interface.
//!
//! Thin glue over the build engine: argument parsing, archive discovery in
//! scan mode, and per-archive invocation with independent failure reporting.

mod args;

pub use args::Args;

use crate::archive::BUNDLE_FILE_NAME;
use crate::bundle::{Builder, PipelineOptions, whitespace_minifier};
use crate::error::Result;
use std::path::PathBuf;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    if let Err(reason) = args.validate() {
        eprintln!("Error: {reason}");
        return Ok(2);
    }

    let mut options = PipelineOptions::default();
    if args.minify {
        options.minifier = Some(whitespace_minifier());
    }
    if let Some(limit) = args.inline_limit {
        options.inline_limit = limit;
    }
    let builder = Builder::new(&args.out).with_options(options);

    let archives = match (&args.archive, &args.home) {
        (Some(archive), _) => vec![archive.clone()],
        (None, Some(home)) => discover_archives(home)?,
        (None, None) => unreachable!("validated above"),
    };

    if archives.is_empty() {
        eprintln!("No module archives found");
        return Ok(1);
    }

    let mut failures = 0;
    for archive in &archives {
        log::info!("building {}", archive.display());
        match builder.build(archive).await {
            Ok(releases) => {
                for release in releases {
                    println!("{}", release.display());
                }
            }
            Err(e) => {
                eprintln!("Error: {}: {e}", archive.display());
                failures += 1;
            }
        }
    }

    Ok(if failures == 0 { 0 } else { 1 })
}

/// Enumerates every `<home>/*/*/modules.zip`, in deterministic path order.
fn discover_archives(home: &std::path::Path) -> Result<Vec<PathBuf>> {
    let pattern = home.join("*").join("*").join(BUNDLE_FILE_NAME);
    let pattern = pattern.to_string_lossy().into_owned();
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => crate::bail!("bad scan glob '{pattern}': {e}"),
    };
    let mut archives: Vec<PathBuf> = paths.filter_map(|candidate| candidate.ok()).collect();
    archives.sort();
    Ok(archives)
}
