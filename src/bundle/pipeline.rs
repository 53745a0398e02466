//! Per-module asset processing.
//!
//! Each module is processed as a set of independent parallel sub-tasks:
//! configuration collection, class script collection, and one task per public
//! asset (copy + datafy/dimension-probe + optional minify). All tasks are
//! joined before the module counts as processed; any single failure is fatal
//! for the enclosing bundle.

use crate::archive::{Archive, CLASS_DIR, CONFIG_DIR, EntryHandle, PRIMARY_CONFIG, PUBLIC_DIR};
use crate::bundle::compose::BundledModule;
use crate::bundle::transforms::{Minifier, data_uri, probe_dimensions};
use crate::error::{BuildError, ErrorExt, Result};
use crate::spec::{AssetAnnotation, ModuleSpec, PublishEntry};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Asset pipeline configuration.
///
/// Extension membership and the inline size limit are explicit options passed
/// in at construction; there is no global mutable state.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Extensions eligible for data-URI inlining (when small enough).
    pub inline_extensions: BTreeSet<String>,
    /// Extensions eligible for dimension probing (when too big to inline).
    pub graphic_extensions: BTreeSet<String>,
    /// Uncompressed-size ceiling for inlining, in bytes.
    pub inline_limit: u64,
    /// Optional minification stage. Off by default.
    pub minifier: Option<Minifier>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        PipelineOptions {
            inline_extensions: set(&["png", "gif", "jpg", "jpeg", "ico", "svg"]),
            graphic_extensions: set(&["png", "gif", "jpg", "jpeg"]),
            inline_limit: 8 * 1024,
            minifier: None,
        }
    }
}

impl std::fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("inline_extensions", &self.inline_extensions)
            .field("graphic_extensions", &self.graphic_extensions)
            .field("inline_limit", &self.inline_limit)
            .field("minifier", &self.minifier.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Processes one bundled module: collects its configuration and class
/// scripts, publishes its public assets into `staging/<ordinal>/`, and
/// returns the module's slice of the specification tree.
pub async fn process_module(
    module: &BundledModule,
    staging: &Path,
    options: Arc<PipelineOptions>,
) -> Result<ModuleSpec> {
    let ((config_sources, config_values), classes, publishes) = tokio::try_join!(
        collect_configs(module),
        collect_classes(module),
        publish_assets(module, staging, Arc::clone(&options)),
    )?;

    Ok(ModuleSpec {
        archive_name: module.archive.name().to_string(),
        archive_version: module.archive.version().as_str().to_string(),
        ordinal: module.ordinal,
        config_sources,
        config_values,
        classes,
        publishes,
    })
}

/// Reads the mandatory primary configuration document plus every secondary
/// document under `config/`, in ascending path order.
///
/// Secondary reads run concurrently; order is restored by sorting on the
/// entry path before consumption.
async fn collect_configs(module: &BundledModule) -> Result<(Vec<String>, Vec<serde_json::Value>)> {
    let primary = module
        .assets
        .get(PRIMARY_CONFIG)
        .ok_or_else(|| BuildError::MissingConfig {
            module: module.name.clone(),
            archive: module.archive.coordinate(),
        })?;
    let primary_source = module.archive.read_text(primary).await?;

    let mut reads: JoinSet<Result<(String, String)>> = JoinSet::new();
    for (relpath, entry) in &module.assets {
        if relpath.starts_with(CONFIG_DIR) && relpath.ends_with(".json") {
            let archive = Arc::clone(&module.archive);
            let relpath = relpath.clone();
            let entry = entry.clone();
            reads.spawn(async move {
                let source = archive.read_text(&entry).await?;
                Ok((relpath, source))
            });
        }
    }

    let mut secondary = Vec::new();
    while let Some(joined) = reads.join_next().await {
        secondary.push(join_flat(joined)?);
    }
    secondary.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut sources = Vec::with_capacity(1 + secondary.len());
    sources.push(primary_source);
    sources.extend(secondary.into_iter().map(|(_, source)| source));

    let values = sources
        .iter()
        .map(|source| {
            serde_json::from_str::<serde_json::Value>(source).map_err(|source| BuildError::Json {
                context: format!("configuration of module '{}'", module.name),
                source,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((sources, values))
}

/// Reads every class script under `class/`, keyed by dotted class name
/// (the relative path with separators replaced by `.`).
async fn collect_classes(module: &BundledModule) -> Result<BTreeMap<String, String>> {
    let mut reads: JoinSet<Result<(String, String)>> = JoinSet::new();
    for (relpath, entry) in &module.assets {
        let Some(class_path) = relpath.strip_prefix(CLASS_DIR) else {
            continue;
        };
        let Some(stem) = class_path.strip_suffix(".js") else {
            continue;
        };
        let class_name = stem.replace('/', ".");
        let archive = Arc::clone(&module.archive);
        let entry = entry.clone();
        reads.spawn(async move {
            let source = archive.read_text(&entry).await?;
            Ok((class_name, source))
        });
    }

    let mut classes = BTreeMap::new();
    while let Some(joined) = reads.join_next().await {
        let (class_name, source) = join_flat(joined)?;
        classes.insert(class_name, source);
    }
    Ok(classes)
}

/// Publishes every asset under `public/`: copies the raw bytes to
/// `staging/<ordinal>/<relpath>`, derives the datafy/dimension annotation,
/// and writes a minified sibling when a minifier is configured.
async fn publish_assets(
    module: &BundledModule,
    staging: &Path,
    options: Arc<PipelineOptions>,
) -> Result<BTreeMap<String, PublishEntry>> {
    let module_dir = staging.join(module.ordinal.to_string());

    let mut tasks: JoinSet<Result<(String, PublishEntry)>> = JoinSet::new();
    for (relpath, entry) in &module.assets {
        let Some(public_path) = relpath.strip_prefix(PUBLIC_DIR) else {
            continue;
        };
        if public_path.is_empty() {
            continue;
        }
        let archive = Arc::clone(&module.archive);
        let entry = entry.clone();
        let public_path = public_path.to_string();
        let destination = module_dir.join(&public_path);
        let options = Arc::clone(&options);
        tasks.spawn(async move {
            publish_one(&archive, &entry, public_path, destination, &options).await
        });
    }

    let mut publishes = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (public_path, published) = join_flat(joined)?;
        publishes.insert(public_path, published);
    }
    Ok(publishes)
}

async fn publish_one(
    archive: &Arc<Archive>,
    entry: &EntryHandle,
    public_path: String,
    destination: PathBuf,
    options: &PipelineOptions,
) -> Result<(String, PublishEntry)> {
    let bytes = archive.read_bytes(entry).await?;
    let size = entry.uncompressed_size;

    write_file(&destination, &bytes).await?;

    let extension = public_path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let annotation = if options.inline_extensions.contains(&extension) && size <= options.inline_limit
    {
        AssetAnnotation::Inlined(data_uri(&extension, &bytes))
    } else if options.graphic_extensions.contains(&extension) && size > options.inline_limit {
        let (width, height) = probe_dimensions(&entry.path, &bytes)?;
        AssetAnnotation::Dimensions { width, height }
    } else {
        AssetAnnotation::None
    };

    let mut minified_size = None;
    if let Some(minifier) = &options.minifier {
        if public_path.ends_with(".js") && !public_path.ends_with(".min.js") {
            let source = String::from_utf8(bytes).map_err(|e| BuildError::EntryRead {
                entry: entry.path.clone(),
                archive: archive.coordinate(),
                reason: format!("script is not valid UTF-8: {e}"),
            })?;
            let minified = minifier(&source);
            let sibling = format!("{}.min.js", public_path.trim_end_matches(".js"));
            let destination = destination
                .parent()
                .map(|dir| dir.join(sibling.rsplit('/').next().unwrap_or(&sibling)))
                .unwrap_or_else(|| PathBuf::from(&sibling));
            write_file(&destination, minified.as_bytes()).await?;
            minified_size = Some(minified.len() as u64);
        }
    }

    Ok((
        public_path,
        PublishEntry {
            size,
            annotation,
            minified_size,
        },
    ))
}

/// Writes `bytes` to `path`, creating parent directories as needed.
async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .fs_context("creating asset directory", parent)?;
    }
    tokio::fs::write(path, bytes)
        .await
        .fs_context("writing asset", path)
}

/// Flattens a JoinSet join result, turning task panics into build errors.
fn join_flat<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.map_err(|e| BuildError::Generic(format!("asset task panicked: {e}")))?
}
