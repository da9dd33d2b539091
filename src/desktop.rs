//! Desktop integration: reveal a folder in the file manager and ask the user
//! for a download folder through the platform's native dialog.

use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::core::config;
use crate::core::error::AppError;
use crate::core::process::run_with_timeout;

const PICKER_TITLE: &str = "Select Download Location";

/// Program that opens a directory in the file manager on `os`.
fn opener_for(os: &str) -> &'static str {
    match os {
        "windows" => "explorer",
        "macos" => "open",
        _ => "xdg-open",
    }
}

/// Program and arguments of the native folder picker on `os`.
///
/// Each command prints the chosen path on stdout and exits non-zero (or
/// prints nothing) when the dialog is cancelled.
fn picker_command(os: &str) -> (&'static str, Vec<String>) {
    match os {
        "macos" => (
            "osascript",
            vec![
                "-e".to_string(),
                format!("POSIX path of (choose folder with prompt \"{}\")", PICKER_TITLE),
            ],
        ),
        "windows" => (
            "powershell",
            vec![
                "-NoProfile".to_string(),
                "-Command".to_string(),
                format!(
                    "Add-Type -AssemblyName System.Windows.Forms; \
                     $d = New-Object System.Windows.Forms.FolderBrowserDialog; \
                     $d.Description = '{}'; \
                     if ($d.ShowDialog() -eq 'OK') {{ $d.SelectedPath }}",
                    PICKER_TITLE
                ),
            ],
        ),
        _ => (
            "zenity",
            vec![
                "--file-selection".to_string(),
                "--directory".to_string(),
                format!("--title={}", PICKER_TITLE),
            ],
        ),
    }
}

/// Opens `dir` in the OS file manager.
pub async fn open_folder(dir: &Path) -> Result<(), AppError> {
    let os = std::env::consts::OS;
    let opener = opener_for(os);
    let mut cmd = Command::new(opener);
    cmd.arg(dir);

    log::info!("Opening {} with {}", dir.display(), opener);
    let output = run_with_timeout(&mut cmd, config::tools::probe_timeout()).await?;

    // explorer exits with 1 even when the window opened fine
    if output.status.success() || os == "windows" {
        Ok(())
    } else {
        Err(AppError::Anyhow(anyhow::anyhow!(
            "Failed to open folder: {} exited with {}",
            opener,
            output.status
        )))
    }
}

/// Shows the native folder picker and returns the chosen directory.
///
/// `None` when the user cancels or no dialog helper is available.
pub async fn pick_folder() -> Option<PathBuf> {
    let (program, args) = picker_command(std::env::consts::OS);
    let mut cmd = Command::new(program);
    cmd.args(&args);

    match run_with_timeout(&mut cmd, config::tools::folder_picker_timeout()).await {
        Ok(output) if output.status.success() => parse_picker_output(&output.stdout),
        Ok(_) => {
            log::debug!("Folder selection cancelled");
            None
        }
        Err(e) => {
            log::warn!("Folder picker {} unavailable: {}", program, e);
            None
        }
    }
}

fn parse_picker_output(stdout: &[u8]) -> Option<PathBuf> {
    let text = String::from_utf8_lossy(stdout);
    let path = text.trim();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}
