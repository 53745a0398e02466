//! Best-archive selection among sibling version directories.

use super::{Archive, BUNDLE_FILE_NAME, Constraint, Version};
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Finds the archive under `home_dir/<archive_name>/` whose version best
/// satisfies `constraint`, and opens it.
///
/// Candidates are enumerated with a filesystem glob over-approximating the
/// constraint, then filtered by exact constraint match; the greatest matching
/// version wins. Returns `Ok(None)` when no candidate satisfies the
/// constraint; the caller turns that into a fatal missing-archive error.
pub async fn find_best_archive(
    home_dir: &Path,
    archive_name: &str,
    constraint: &Constraint,
) -> Result<Option<Arc<Archive>>> {
    let pattern = home_dir
        .join(archive_name)
        .join(constraint.glob_pattern())
        .join(BUNDLE_FILE_NAME);
    let pattern = pattern.to_string_lossy().into_owned();

    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => crate::bail!("bad archive glob '{pattern}': {e}"),
    };

    let mut candidates: Vec<(Version, PathBuf)> = Vec::new();
    for candidate in paths {
        let Ok(path) = candidate else { continue };
        let Some(version) = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(Version::new)
        else {
            continue;
        };
        if constraint.matches(&version) {
            candidates.push((version, path));
        }
    }

    let Some((version, path)) = candidates.into_iter().max_by(|(a, _), (b, _)| a.cmp(b)) else {
        log::debug!("no archive for {archive_name} matching {constraint} under {pattern}");
        return Ok(None);
    };

    log::debug!("resolved {archive_name} {constraint} -> {version} ({})", path.display());
    Ok(Some(Archive::open(&path).await?))
}
