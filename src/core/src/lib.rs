//! Secure Import Core - Foundational Types
//!
//! Errors, run configuration and the report model shared by the
//! runtime engine and the command-line front end.

pub mod config;
pub mod error;
pub mod log;
pub mod report;

// Re-export commonly used types
pub use config::{ImportConfig, ReportFormat};
pub use error::{ImportError, Result};
pub use log::LogFormat;
pub use report::{ChartOutcome, ImportOutcome, ImportStatus, Report, ReportSummary};

/// Secure import version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
