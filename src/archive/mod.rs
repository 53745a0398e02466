//! Archive model: one opened, versioned module archive.
//!
//! An archive lives at `<home>/<name>/<version>/modules.zip`. The name and
//! version are parsed from the path and validated against fixed patterns; the
//! entry index and the derived module map are built once, at open time, and
//! never change afterwards. Entry reads go through a single shared container
//! handle and are safe to issue concurrently.

mod resolver;
mod version;

pub use resolver::find_best_archive;
pub use version::{Constraint, Version};

use crate::error::{BuildError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use zip::ZipArchive;

/// Fixed file name of a module archive inside its version directory.
pub const BUNDLE_FILE_NAME: &str = "modules.zip";

/// Suffix marking a top-level entry as a bundle configuration document.
pub const BUNDLE_CONFIG_SUFFIX: &str = ".bundle.json";

/// Primary configuration document, relative to a module root. Mandatory.
pub const PRIMARY_CONFIG: &str = "config.json";

/// Directory of secondary configuration documents, relative to a module root.
pub const CONFIG_DIR: &str = "config/";

/// Directory of class scripts, relative to a module root.
pub const CLASS_DIR: &str = "class/";

/// Directory of public assets, relative to a module root.
pub const PUBLIC_DIR: &str = "public/";

/// Boot script, relative to a module root. At most one per bundle.
pub const BOOT_SCRIPT: &str = "boot.js";

static ARCHIVE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_.-]*$").expect("archive name pattern is valid")
});

static ARCHIVE_VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9][A-Za-z0-9._-]*$").expect("archive version pattern is valid")
});

/// Handle to one archive entry: its path and sizes.
///
/// Reading the entry goes back through [`Archive::read_bytes`] or
/// [`Archive::read_text`].
#[derive(Debug, Clone)]
pub struct EntryHandle {
    /// Full entry path inside the archive.
    pub path: String,
    /// Stored (compressed) size in bytes.
    pub compressed_size: u64,
    /// Uncompressed size in bytes.
    pub uncompressed_size: u64,
}

/// One opened, versioned module archive.
///
/// Identity `(name, version)` is immutable once opened. The module map treats
/// every top-level directory segment containing a literal `.` as a module
/// name; entries beneath it are that module's assets, keyed by the path
/// relative to the module root.
pub struct Archive {
    name: String,
    version: Version,
    path: PathBuf,
    reader: Mutex<ZipArchive<File>>,
    modules: BTreeMap<String, BTreeMap<String, EntryHandle>>,
    bundle_configs: BTreeMap<String, EntryHandle>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("path", &self.path)
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Archive {
    /// Opens the archive at `path` and builds its module index.
    ///
    /// The path must look like `<home>/<name>/<version>/modules.zip` with the
    /// name and version matching the configured patterns; anything else is a
    /// fatal invalid-archive error. No side effects beyond reading.
    pub async fn open(path: &Path) -> Result<Arc<Self>> {
        let (name, version) = parse_archive_path(path)?;
        let path = path.to_path_buf();

        let archive = tokio::task::spawn_blocking(move || -> Result<Archive> {
            let file = File::open(&path).map_err(|e| BuildError::InvalidArchive {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let mut reader = ZipArchive::new(file).map_err(|source| BuildError::Container {
                path: path.clone(),
                source,
            })?;

            let mut modules: BTreeMap<String, BTreeMap<String, EntryHandle>> = BTreeMap::new();
            let mut bundle_configs = BTreeMap::new();

            for index in 0..reader.len() {
                let entry = reader
                    .by_index(index)
                    .map_err(|source| BuildError::Container {
                        path: path.clone(),
                        source,
                    })?;
                if entry.is_dir() {
                    continue;
                }
                let entry_path = entry.name().to_string();
                let handle = EntryHandle {
                    path: entry_path.clone(),
                    compressed_size: entry.compressed_size(),
                    uncompressed_size: entry.size(),
                };

                match entry_path.split_once('/') {
                    Some((top, rest)) if top.contains('.') && !rest.is_empty() => {
                        modules
                            .entry(top.to_string())
                            .or_default()
                            .insert(rest.to_string(), handle);
                    }
                    None => {
                        if let Some(bundle) = entry_path.strip_suffix(BUNDLE_CONFIG_SUFFIX) {
                            if !bundle.is_empty() {
                                bundle_configs.insert(bundle.to_string(), handle);
                            }
                        }
                    }
                    _ => {}
                }
            }

            Ok(Archive {
                name,
                version,
                path,
                reader: Mutex::new(reader),
                modules,
                bundle_configs,
            })
        })
        .await
        .map_err(|e| BuildError::Generic(format!("archive open task panicked: {e}")))??;

        Ok(Arc::new(archive))
    }

    /// Archive name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Archive version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// The archive coordinate, as `name/version`.
    pub fn coordinate(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    /// Path the archive was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Home directory the archive's siblings live under
    /// (three levels above the archive file).
    pub fn home_dir(&self) -> Option<&Path> {
        self.path.parent()?.parent()?.parent()
    }

    /// Module map: module name → (asset relpath → entry).
    pub fn modules(&self) -> &BTreeMap<String, BTreeMap<String, EntryHandle>> {
        &self.modules
    }

    /// Bundle configuration documents found at the archive top level,
    /// as `(bundle name, source text)` in ascending name order.
    pub async fn bundle_config_sources(self: &Arc<Self>) -> Result<Vec<(String, String)>> {
        let mut out = Vec::with_capacity(self.bundle_configs.len());
        for (bundle, handle) in &self.bundle_configs {
            let source = self.read_text(handle).await?;
            out.push((bundle.clone(), source));
        }
        Ok(out)
    }

    /// Reads one entry fully into memory.
    pub async fn read_bytes(self: &Arc<Self>, entry: &EntryHandle) -> Result<Vec<u8>> {
        let this = Arc::clone(self);
        let entry_path = entry.path.clone();
        let expected = entry.uncompressed_size as usize;

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut reader = this
                .reader
                .lock()
                .map_err(|_| BuildError::Generic("archive reader poisoned".into()))?;
            let mut file =
                reader
                    .by_name(&entry_path)
                    .map_err(|source| BuildError::EntryRead {
                        entry: entry_path.clone(),
                        archive: this.coordinate(),
                        reason: source.to_string(),
                    })?;
            let mut buf = Vec::with_capacity(expected);
            file.read_to_end(&mut buf)
                .map_err(|source| BuildError::EntryRead {
                    entry: entry_path.clone(),
                    archive: this.coordinate(),
                    reason: source.to_string(),
                })?;
            Ok(buf)
        })
        .await
        .map_err(|e| BuildError::Generic(format!("entry read task panicked: {e}")))?
    }

    /// Reads one entry as UTF-8 text.
    pub async fn read_text(self: &Arc<Self>, entry: &EntryHandle) -> Result<String> {
        let bytes = self.read_bytes(entry).await?;
        String::from_utf8(bytes).map_err(|e| BuildError::EntryRead {
            entry: entry.path.clone(),
            archive: self.coordinate(),
            reason: format!("not valid UTF-8: {e}"),
        })
    }
}

/// Extracts and validates `(name, version)` from an archive path.
///
/// Grandparent directory = archive name, parent directory = version.
fn parse_archive_path(path: &Path) -> Result<(String, Version)> {
    let invalid = |reason: &str| BuildError::InvalidArchive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let version_dir = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("missing version directory"))?;
    let name_dir = path
        .parent()
        .and_then(|p| p.parent())
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("missing archive name directory"))?;

    if !ARCHIVE_NAME_PATTERN.is_match(name_dir) {
        return Err(invalid(&format!("archive name '{name_dir}' does not match pattern")));
    }
    if !ARCHIVE_VERSION_PATTERN.is_match(version_dir) {
        return Err(invalid(&format!(
            "archive version '{version_dir}' does not match pattern"
        )));
    }

    Ok((name_dir.to_string(), Version::new(version_dir)))
}
