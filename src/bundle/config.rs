//! Bundle configuration documents.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Configuration for one bundle, parsed from a `<name>.bundle.json` document
/// at the archive top level.
///
/// `versions` constrains the external archives that may supply modules;
/// `includes`/`excludes` are module-name-prefix filters. The default include
/// list is `[""]`, meaning "all modules".
///
/// ```json
/// {
///   "versions": { "ui-kit": "2.x" },
///   "includes": ["app."],
///   "excludes": ["app.test"]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BundleConfig {
    /// External archive version constraints (archive name → constraint).
    #[serde(default)]
    pub versions: BTreeMap<String, String>,

    /// Module-name prefixes to include. Default: include everything.
    #[serde(default = "default_includes")]
    pub includes: Vec<String>,

    /// Module-name prefixes to exclude.
    #[serde(default)]
    pub excludes: Vec<String>,
}

fn default_includes() -> Vec<String> {
    vec![String::new()]
}

impl Default for BundleConfig {
    fn default() -> Self {
        BundleConfig {
            versions: BTreeMap::new(),
            includes: default_includes(),
            excludes: Vec::new(),
        }
    }
}

impl BundleConfig {
    /// Whether `module` is selected: it must match at least one include
    /// prefix and no exclude prefix. Prefix match is an exact string-prefix
    /// test.
    pub fn selects(&self, module: &str) -> bool {
        self.includes.iter().any(|p| module.starts_with(p.as_str()))
            && !self.excludes.iter().any(|p| module.starts_with(p.as_str()))
    }
}
