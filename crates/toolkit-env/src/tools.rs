//! Locating the `uv` binary.
//!
//! `uv` is discovered on PATH once per process and cached. There is no
//! automatic download: if `uv` is missing the caller gets an actionable
//! error instead of a silent fallback to a slower installer.

use anyhow::{anyhow, Result};
use log::info;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

static UV_PATH: OnceCell<Option<PathBuf>> = OnceCell::const_new();

/// Binary name for the current platform.
#[cfg(target_os = "windows")]
const UV_BINARY: &str = "uv.exe";
#[cfg(not(target_os = "windows"))]
const UV_BINARY: &str = "uv";

/// Get the path to `uv`, discovering it on first call.
pub async fn uv_path() -> Result<PathBuf> {
    let cached = UV_PATH.get_or_init(|| async { discover_uv().await }).await;
    cached.clone().ok_or_else(|| {
        anyhow!("uv not found on PATH (install instructions: https://docs.astral.sh/uv/)")
    })
}

/// Check whether `uv` is available.
pub async fn check_uv_available() -> bool {
    uv_path().await.is_ok()
}

/// Find `uv` on PATH and verify it runs.
async fn discover_uv() -> Option<PathBuf> {
    let candidate = find_in_path(UV_BINARY)?;

    let output = tokio::process::Command::new(&candidate)
        .arg("--version")
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    info!("[toolkit] Found {} at {:?}", version, candidate);
    Some(candidate)
}

/// Search each PATH entry for an executable with the given name.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
