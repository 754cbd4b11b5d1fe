//! External tool invocation.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use secure_import_core::error::{ImportError, Result};
use tokio::process::Command;

/// Run `program` with `args`, returning stdout on success.
///
/// A non-zero exit becomes a [`ImportError::ToolError`] carrying the exit
/// code and trimmed stderr.
pub async fn run_tool<I, S>(tool: &str, program: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(tool, command = ?cmd.as_std(), "Running external tool");

    let output = cmd.output().await.map_err(|e| ImportError::ToolError {
        tool: tool.to_string(),
        message: format!("failed to run {}: {}", program.display(), e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ImportError::ToolError {
            tool: tool.to_string(),
            message: format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
