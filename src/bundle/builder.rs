//! Build orchestration: from one opened archive to published releases.
//!
//! Each bundle configuration found in the main archive yields its own build
//! pipeline; bundles fail independently. A release is staged in a sibling
//! directory and renamed into place only after every module processed and
//! every artifact was written, so a half-complete directory is never
//! observable as a published release.

use crate::archive::Archive;
use crate::bundle::compose::{Composition, compose};
use crate::bundle::config::BundleConfig;
use crate::bundle::pipeline::{PipelineOptions, process_module};
use crate::bundle::release::{provenance, release_id};
use crate::error::{BuildError, Context, ErrorExt, Result};
use crate::spec::writer::render_loader;
use crate::spec::{BootSpec, BundleSpec, meta};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Builds every bundle configured in the archive at `archive_path` into
/// `out_dir`, with default pipeline options.
///
/// Returns the release directory paths, including those of releases that
/// already existed (idempotent no-ops).
pub async fn build(archive_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    Builder::new(out_dir).build(archive_path).await
}

/// Release builder for one output directory.
///
/// # Examples
///
/// ```no_run
/// use stagepack::bundle::{Builder, PipelineOptions};
///
/// # async fn example() -> stagepack::Result<()> {
/// let releases = Builder::new("out")
///     .with_options(PipelineOptions::default())
///     .build(std::path::Path::new("repo/app/1.0.0/modules.zip"))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Builder {
    out_dir: PathBuf,
    options: Arc<PipelineOptions>,
}

impl Builder {
    /// Creates a builder publishing into `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Builder {
            out_dir: out_dir.into(),
            options: Arc::new(PipelineOptions::default()),
        }
    }

    /// Replaces the asset pipeline options.
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    /// Opens the main archive, then builds every bundle it configures.
    ///
    /// Bundles fail independently: the remaining bundles still build, and the
    /// call reports the failed ones together afterwards.
    pub async fn build(&self, archive_path: &Path) -> Result<Vec<PathBuf>> {
        let main = Archive::open(archive_path).await?;
        let home = main
            .home_dir()
            .map(Path::to_path_buf)
            .context("archive path has no home directory")?;

        let configs = main.bundle_config_sources().await?;
        if configs.is_empty() {
            log::warn!("archive {} configures no bundles", main.coordinate());
            return Ok(Vec::new());
        }

        let mut releases = Vec::new();
        let mut failed = Vec::new();
        for (bundle_name, config_source) in configs {
            let result = self
                .build_bundle(&main, &home, &bundle_name, &config_source)
                .await;
            match result {
                Ok(release_dir) => releases.push(release_dir),
                Err(e) => {
                    log::error!("bundle '{bundle_name}' failed: {e}");
                    failed.push(bundle_name);
                }
            }
        }

        if failed.is_empty() {
            Ok(releases)
        } else {
            Err(BuildError::BundlesFailed { failed })
        }
    }

    async fn build_bundle(
        &self,
        main: &Arc<Archive>,
        home: &Path,
        bundle_name: &str,
        config_source: &str,
    ) -> Result<PathBuf> {
        let config: BundleConfig =
            serde_json::from_str(config_source).map_err(|source| BuildError::Json {
                context: format!("bundle configuration '{bundle_name}'"),
                source,
            })?;

        let composition = compose(Arc::clone(main), bundle_name, &config, home).await?;
        let release = provenance(main, &composition.modules);
        let id = release_id(&release);

        let bundle_dir = self.out_dir.join(bundle_name);
        let release_dir = bundle_dir.join(&id);
        if tokio::fs::try_exists(&release_dir)
            .await
            .fs_context("probing release directory", &release_dir)?
        {
            log::info!("bundle '{bundle_name}' release {id} already published, skipping");
            return Ok(release_dir);
        }

        let staging = bundle_dir.join(format!(".staging-{id}"));
        if tokio::fs::try_exists(&staging)
            .await
            .fs_context("probing staging directory", &staging)?
        {
            // Leftover from an aborted build; it was never observable as
            // published, so it is safe to discard.
            tokio::fs::remove_dir_all(&staging)
                .await
                .fs_context("clearing stale staging directory", &staging)?;
        }
        tokio::fs::create_dir_all(&staging)
            .await
            .fs_context("creating staging directory", &staging)?;

        let result = self
            .publish(bundle_name, config_source, &composition, release, &staging)
            .await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        match tokio::fs::rename(&staging, &release_dir).await {
            Ok(()) => {
                log::info!("bundle '{bundle_name}' published as {id}");
                Ok(release_dir)
            }
            Err(rename_err) => {
                // A concurrent build may have published the identical release
                // first; the staged copy is redundant then.
                if release_dir.exists() {
                    let _ = tokio::fs::remove_dir_all(&staging).await;
                    log::info!("bundle '{bundle_name}' release {id} published concurrently");
                    Ok(release_dir)
                } else {
                    let _ = tokio::fs::remove_dir_all(&staging).await;
                    Err(BuildError::Fs {
                        action: "publishing release".into(),
                        path: release_dir,
                        source: rename_err,
                    })
                }
            }
        }
    }

    /// Processes every module into the staging directory and emits the
    /// loader, the minified loader (when minifying), and the metadata JSON.
    async fn publish(
        &self,
        bundle_name: &str,
        config_source: &str,
        composition: &Composition,
        release: String,
        staging: &Path,
    ) -> Result<()> {
        let mut tasks: JoinSet<Result<(String, crate::spec::ModuleSpec)>> = JoinSet::new();
        for module in composition.modules.values() {
            let module = module.clone();
            let staging = staging.to_path_buf();
            let options = Arc::clone(&self.options);
            tasks.spawn(async move {
                let processed = process_module(&module, &staging, options).await?;
                Ok((module.name, processed))
            });
        }

        let mut modules = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (name, processed) = joined
                .map_err(|e| BuildError::Generic(format!("module task panicked: {e}")))??;
            modules.insert(name, processed);
        }

        let boot = match &composition.boot {
            Some(boot_module) => {
                let module = composition.modules.get(boot_module).ok_or_else(|| {
                    BuildError::Generic(format!("boot module '{boot_module}' not in composition"))
                })?;
                let entry = module.boot_entry().ok_or_else(|| {
                    BuildError::Generic(format!("boot module '{boot_module}' lost its boot script"))
                })?;
                let source = module.archive.read_text(entry).await?;
                Some(BootSpec {
                    module: boot_module.clone(),
                    source,
                })
            }
            None => None,
        };

        let archives = composition
            .archives
            .iter()
            .map(|(name, archive)| (name.clone(), archive.version().as_str().to_string()))
            .collect();

        let spec = BundleSpec {
            bundle_name: bundle_name.to_string(),
            release,
            config_source: config_source.to_string(),
            boot,
            archives,
            modules,
        };

        let loader_dir = staging.join("0");
        tokio::fs::create_dir_all(&loader_dir)
            .await
            .fs_context("creating loader directory", &loader_dir)?;

        let loader = render_loader(&spec);
        let loader_path = loader_dir.join(BundleSpec::loader_file());
        tokio::fs::write(&loader_path, &loader)
            .await
            .fs_context("writing loader", &loader_path)?;

        if let Some(minifier) = &self.options.minifier {
            let minified = minifier(&loader);
            let minified_path = loader_dir.join(BundleSpec::minified_loader_file());
            tokio::fs::write(&minified_path, minified)
                .await
                .fs_context("writing minified loader", &minified_path)?;
        }

        let metadata = meta::derive_metadata(&spec);
        let metadata_text =
            serde_json::to_string_pretty(&metadata).map_err(|source| BuildError::Json {
                context: format!("metadata of bundle '{bundle_name}'"),
                source,
            })?;
        let metadata_path = loader_dir.join(BundleSpec::metadata_file());
        tokio::fs::write(&metadata_path, metadata_text)
            .await
            .fs_context("writing metadata", &metadata_path)?;

        Ok(())
    }
}
