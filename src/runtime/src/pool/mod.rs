//! Bounded worker pool for image imports.
//!
//! Fans a fixed list of references out to [`ImportPipeline`](crate::pipeline::ImportPipeline)
//! runs and fans the outcomes back in once every worker has finished.

pub mod import_pool;

pub use import_pool::{worker_count, ImportPool, MAX_WORKERS};
