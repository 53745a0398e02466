//! The bundle specification tree.
//!
//! One in-memory tree is the single source of truth for a release. Two
//! renderers consume it: [`writer`] emits the loader source text and
//! [`meta`] derives the metadata JSON. Keeping both derivations on the same
//! tree guarantees the shipped loader and the published metadata never drift
//! apart.

pub mod meta;
pub mod writer;

use std::collections::BTreeMap;

/// Base name of the generated loader/metadata files in the `0/` directory.
pub const LOADER_BASE: &str = "main";

/// Derived annotation on a published asset.
///
/// Inlining and dimension annotation are mutually exclusive: an asset small
/// enough to inline is never dimension-probed, and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetAnnotation {
    /// No derived annotation.
    None,
    /// Inlined as a data-URI string (small assets in the inline set).
    Inlined(String),
    /// Pixel dimensions (large assets in the graphics set).
    Dimensions {
        /// Pixel width.
        width: u32,
        /// Pixel height.
        height: u32,
    },
}

/// One published public asset.
#[derive(Debug, Clone)]
pub struct PublishEntry {
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Derived annotation, if any.
    pub annotation: AssetAnnotation,
    /// Byte length of the minified sibling, when the asset was minified.
    pub minified_size: Option<u64>,
}

/// One module's slice of the specification tree.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    /// Providing archive name.
    pub archive_name: String,
    /// Providing archive version.
    pub archive_version: String,
    /// 1-based ordinal; the on-disk asset subdirectory.
    pub ordinal: usize,
    /// Configuration document sources: primary first, then secondaries in
    /// ascending path order.
    pub config_sources: Vec<String>,
    /// Parsed configuration documents, parallel to `config_sources`.
    pub config_values: Vec<serde_json::Value>,
    /// Class scripts, keyed by dotted class name.
    pub classes: BTreeMap<String, String>,
    /// Published public assets, keyed by relative path.
    pub publishes: BTreeMap<String, PublishEntry>,
}

/// Boot hook for a bundle: the boot module and its script source.
#[derive(Debug, Clone)]
pub struct BootSpec {
    /// Name of the boot module.
    pub module: String,
    /// Boot script source, embedded verbatim in the loader prologue.
    pub source: String,
}

/// The complete specification of one bundle release.
#[derive(Debug, Clone)]
pub struct BundleSpec {
    /// Bundle name.
    pub bundle_name: String,
    /// Provenance string the release id was derived from.
    pub release: String,
    /// The bundle's own configuration source, embedded verbatim.
    pub config_source: String,
    /// Boot hook, if a module supplied one.
    pub boot: Option<BootSpec>,
    /// Participating archives: name → version.
    pub archives: BTreeMap<String, String>,
    /// Bundled modules in ascending name order.
    pub modules: BTreeMap<String, ModuleSpec>,
}

impl BundleSpec {
    /// Loader file name (`main.js`).
    pub fn loader_file() -> String {
        format!("{LOADER_BASE}.js")
    }

    /// Minified loader file name (`main.min.js`).
    pub fn minified_loader_file() -> String {
        format!("{LOADER_BASE}.min.js")
    }

    /// Metadata file name (`main.json`).
    pub fn metadata_file() -> String {
        format!("{LOADER_BASE}.json")
    }
}
