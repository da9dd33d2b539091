//! Process execution utilities with timeout support
//!
//! Provides helpers for running external processes (yt-dlp, ffmpeg, dialog
//! helpers) with configurable timeouts so a hung process cannot stall a request.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::core::error::AppError;

/// Run an async Command with a timeout.
///
/// Returns the process Output on success, or an AppError on timeout/IO failure.
/// The child is killed when the timeout elapses.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, AppError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::Io(e)),
        Err(_) => Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("Process timed out after {}s", timeout.as_secs()),
        ))),
    }
}

/// Check that `binary` can be executed by running it with `version_flag`.
///
/// Any spawn failure, timeout or non-zero exit is reported as
/// `AppError::PreconditionFailed` naming the binary.
pub async fn probe_tool(binary: &str, version_flag: &str, timeout: Duration) -> Result<(), AppError> {
    let mut cmd = Command::new(binary);
    cmd.arg(version_flag);

    match run_with_timeout(&mut cmd, timeout).await {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => Err(AppError::PreconditionFailed(format!(
            "{} is not usable (exit status {})",
            binary, output.status
        ))),
        Err(e) => Err(AppError::PreconditionFailed(format!(
            "{} is not available: {}",
            binary, e
        ))),
    }
}
