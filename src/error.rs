//! Error types for archive resolution and release building.
//!
//! Every variant in [`BuildError`] is fatal for the bundle being built; there
//! are no retries at this layer. Unrelated bundles from the same archive keep
//! building independently.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for build operations
pub type Result<T> = std::result::Result<T, BuildError>;

/// Main error type for all build operations
#[derive(Error, Debug)]
pub enum BuildError {
    /// Archive path does not parse into a valid name/version pair
    #[error("invalid archive path {path}: {reason}")]
    InvalidArchive {
        /// Offending path
        path: PathBuf,
        /// Reason the path was rejected
        reason: String,
    },

    /// No candidate archive satisfies a declared version constraint
    #[error(
        "bundle '{bundle}' requires archive '{archive}' matching '{constraint}', \
         but no candidate satisfies it"
    )]
    MissingArchive {
        /// Bundle that declared the dependency
        bundle: String,
        /// Archive name that could not be resolved
        archive: String,
        /// Version constraint that went unmet
        constraint: String,
    },

    /// The same module name was selected from two different archives
    #[error("bundle '{bundle}': module '{module}' is provided by both {first} and {second}")]
    ModuleConflict {
        /// Bundle being composed
        bundle: String,
        /// Conflicting module name
        module: String,
        /// First providing archive, as name/version
        first: String,
        /// Second providing archive, as name/version
        second: String,
    },

    /// Two modules in one bundle both carry a boot script
    #[error("bundle '{bundle}': boot script declared by both '{first}' and '{second}'")]
    BootConflict {
        /// Bundle being composed
        bundle: String,
        /// First boot-capable module
        first: String,
        /// Second boot-capable module
        second: String,
    },

    /// A module lacks its mandatory primary configuration document
    #[error("module '{module}' in archive {archive} has no primary configuration document")]
    MissingConfig {
        /// Module missing its config
        module: String,
        /// Providing archive, as name/version
        archive: String,
    },

    /// Container (ZIP) level failure
    #[error("archive container error at {path}: {source}")]
    Container {
        /// Archive path
        path: PathBuf,
        /// Underlying container error
        source: zip::result::ZipError,
    },

    /// A named entry could not be read from an archive
    #[error("reading entry '{entry}' from archive {archive}: {reason}")]
    EntryRead {
        /// Entry path inside the archive
        entry: String,
        /// Archive coordinate, as name/version
        archive: String,
        /// Underlying failure
        reason: String,
    },

    /// Filesystem operation failure with context
    #[error("{action} at {path}: {source}")]
    Fs {
        /// What was being attempted
        action: String,
        /// Path involved
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// IO errors without richer context
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("JSON error in {context}: {source}")]
    Json {
        /// What was being parsed or written
        context: String,
        /// Underlying serde error
        source: serde_json::Error,
    },

    /// Raster dimension probing failure
    #[error("probing dimensions of '{entry}': {reason}")]
    Dimensions {
        /// Asset path inside the archive
        entry: String,
        /// Underlying decode failure
        reason: String,
    },

    /// One or more bundles from an archive failed to build
    #[error("{} bundle(s) failed to build: {}", .failed.len(), .failed.join(", "))]
    BundlesFailed {
        /// Names of the failed bundles
        failed: Vec<String>,
    },

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    /// Generic errors
    #[error("{0}")]
    Generic(String),
}

/// Bail out of the current function with a [`BuildError::Generic`].
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::BuildError::Generic(format!($($arg)*)))
    };
}

/// Attach a message to `None`, turning it into a [`BuildError::Generic`].
pub trait Context<T> {
    /// Convert an `Option` into a `Result` with the given message.
    fn context(self, msg: &str) -> Result<T>;
}

impl<T> Context<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| BuildError::Generic(msg.to_string()))
    }
}

/// Attach filesystem context (action + path) to IO results.
pub trait ErrorExt<T> {
    /// Wrap an IO error as [`BuildError::Fs`] with the action and path.
    fn fs_context(self, action: &str, path: &std::path::Path) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, action: &str, path: &std::path::Path) -> Result<T> {
        self.map_err(|source| BuildError::Fs {
            action: action.to_string(),
            path: path.to_path_buf(),
            source,
        })
    }
}
