//! Secure Import Runtime - chart and image import engine.
//!
//! Discovers container images in rendered chart output and moves each one
//! into a private registry through an exists → pull → scan → patch → push →
//! sign pipeline, running images concurrently on a bounded worker pool.

#![allow(clippy::result_large_err)]

pub mod chart;
pub mod discovery;
pub mod importer;
pub mod oci;
pub mod pipeline;
pub mod pool;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types
pub use chart::{ChartImport, ChartStage};
pub use discovery::discover_images;
pub use importer::SecureImporter;
pub use oci::{ImageReference, LocalImage, OciRegistry, Registry, RegistryAuth};
pub use pipeline::{ImportPipeline, Stage};
pub use pool::{ImportPool, MAX_WORKERS};
pub use tools::{ChartSource, HelmClient, Patcher, ScanReport, Scanner, Signer, ToolSet};

/// Secure import runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
