//! Secure Import CLI - import a chart and its images into a private registry.

pub mod commands;
pub mod output;
