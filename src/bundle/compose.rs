//! Bundle composition: merging module sets from the main archive and
//! resolved external archives.
//!
//! Composition is order-insensitive by construction: archives and modules are
//! iterated over sorted names wherever an observable output (conflict naming,
//! ordinals, generated text) depends on order.

use crate::archive::{Archive, BOOT_SCRIPT, Constraint, EntryHandle, find_best_archive};
use crate::bundle::config::BundleConfig;
use crate::error::{BuildError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

/// One module selected into a bundle.
#[derive(Debug, Clone)]
pub struct BundledModule {
    /// Module name (the dotted top-level archive segment).
    pub name: String,
    /// Archive the module came from. Non-owning back-reference for lookup.
    pub archive: Arc<Archive>,
    /// Module assets: relpath → entry.
    pub assets: BTreeMap<String, EntryHandle>,
    /// 1-based position of the module name in the sorted bundled-name set;
    /// also the on-disk subdirectory for its published assets.
    pub ordinal: usize,
}

impl BundledModule {
    /// The boot script entry, if this module carries one.
    pub fn boot_entry(&self) -> Option<&EntryHandle> {
        self.assets.get(BOOT_SCRIPT)
    }
}

/// Result of composing one bundle: the selected module set, the archives that
/// supplied them, and the boot module (if any).
#[derive(Debug)]
pub struct Composition {
    /// Selected modules, keyed by name.
    pub modules: BTreeMap<String, BundledModule>,
    /// All participating archives, keyed by name (main + resolved externals).
    pub archives: BTreeMap<String, Arc<Archive>>,
    /// Name of the module supplying the boot script, if any.
    pub boot: Option<String>,
}

/// Composes the module set for `bundle_name` from the main archive plus every
/// external archive named in `config.versions`.
///
/// External archives resolve in parallel; any resolution failure aborts the
/// whole bundle with a fatal missing-archive error. Module-ownership and boot
/// conflicts are fatal and name both parties.
pub async fn compose(
    main: Arc<Archive>,
    bundle_name: &str,
    config: &BundleConfig,
    home_dir: &Path,
) -> Result<Composition> {
    let mut archives: BTreeMap<String, Arc<Archive>> = BTreeMap::new();
    archives.insert(main.name().to_string(), Arc::clone(&main));

    // Resolve externals in parallel; the main archive supplies itself.
    let mut resolutions: JoinSet<Result<(String, String, Option<Arc<Archive>>)>> = JoinSet::new();
    for (external, constraint) in &config.versions {
        if external == main.name() {
            continue;
        }
        let external = external.clone();
        let constraint_str = constraint.clone();
        let home = home_dir.to_path_buf();
        resolutions.spawn(async move {
            let constraint = Constraint::new(constraint_str.clone());
            let resolved = find_best_archive(&home, &external, &constraint).await?;
            Ok((external, constraint_str, resolved))
        });
    }

    while let Some(joined) = resolutions.join_next().await {
        let (external, constraint, resolved) = joined
            .map_err(|e| BuildError::Generic(format!("archive resolution task panicked: {e}")))??;
        match resolved {
            Some(archive) => {
                log::debug!(
                    "bundle '{bundle_name}': resolved {external} {constraint} -> {}",
                    archive.coordinate()
                );
                archives.insert(external, archive);
            }
            None => {
                return Err(BuildError::MissingArchive {
                    bundle: bundle_name.to_string(),
                    archive: external,
                    constraint,
                });
            }
        }
    }

    // Merge module sets over sorted archive and module names.
    let mut modules: BTreeMap<String, BundledModule> = BTreeMap::new();
    for archive in archives.values() {
        for (module_name, assets) in archive.modules() {
            if !config.selects(module_name) {
                continue;
            }
            if let Some(existing) = modules.get(module_name) {
                return Err(BuildError::ModuleConflict {
                    bundle: bundle_name.to_string(),
                    module: module_name.clone(),
                    first: existing.archive.coordinate(),
                    second: archive.coordinate(),
                });
            }
            modules.insert(
                module_name.clone(),
                BundledModule {
                    name: module_name.clone(),
                    archive: Arc::clone(archive),
                    assets: assets.clone(),
                    ordinal: 0,
                },
            );
        }
    }

    // Ordinals follow the sorted name set, 1-based.
    for (ordinal, module) in modules.values_mut().enumerate() {
        module.ordinal = ordinal + 1;
    }

    // Exactly one module may carry a boot script.
    let mut boot: Option<String> = None;
    for module in modules.values() {
        if module.boot_entry().is_some() {
            if let Some(first) = &boot {
                return Err(BuildError::BootConflict {
                    bundle: bundle_name.to_string(),
                    first: first.clone(),
                    second: module.name.clone(),
                });
            }
            boot = Some(module.name.clone());
        }
    }

    log::info!(
        "bundle '{bundle_name}': {} module(s) from {} archive(s){}",
        modules.len(),
        archives.len(),
        boot.as_deref()
            .map(|b| format!(", boot: {b}"))
            .unwrap_or_default()
    );

    Ok(Composition {
        modules,
        archives,
        boot,
    })
}
