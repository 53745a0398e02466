//! Release identity: provenance strings and content-addressed release ids.

use crate::archive::Archive;
use crate::bundle::compose::BundledModule;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use std::collections::BTreeMap;

/// Builds the canonical provenance string for a bundled module set:
/// `=<mainName>/<mainVersion>` followed by `<module>=<archive>/<version>` for
/// every bundled module in ascending name order, comma-joined.
///
/// Two builds with identical module-to-archive provenance always produce the
/// same string; any change in provenance changes it.
pub fn provenance(main: &Archive, modules: &BTreeMap<String, BundledModule>) -> String {
    let mut parts = Vec::with_capacity(modules.len() + 1);
    parts.push(format!("={}", main.coordinate()));
    for (name, module) in modules {
        parts.push(format!("{name}={}", module.archive.coordinate()));
    }
    parts.join(",")
}

/// Derives the release id: the MD5 digest of the provenance string, encoded
/// as padless base64 with `/` mapped to `-` and `+` mapped to `_`.
///
/// The character mapping is fixed: it is this system's historical id
/// alphabet, not the RFC 4648 URL-safe one. Ids must stay stable across
/// implementations.
pub fn release_id(provenance: &str) -> String {
    let digest = md5::compute(provenance.as_bytes());
    STANDARD_NO_PAD
        .encode(digest.0)
        .replace('/', "-")
        .replace('+', "_")
}
