//! Bundle composition and release building.

mod builder;
mod compose;
mod config;
mod pipeline;
mod release;
mod transforms;

pub use builder::{Builder, build};
pub use compose::{BundledModule, Composition, compose};
pub use config::BundleConfig;
pub use pipeline::{PipelineOptions, process_module};
pub use release::{provenance, release_id};
pub use transforms::{Minifier, data_uri, mime_for_extension, probe_dimensions, whitespace_minifier};
