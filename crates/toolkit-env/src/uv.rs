//! UV-based virtual environment and toolkit management.
//!
//! Each kernel environment owns one virtual environment on disk, created
//! with `uv venv` and populated with the kernel toolkit (ipykernel +
//! jupyter-server) via `uv pip install`. Environments live under the
//! application cache directory, one subdirectory per environment id.

use anyhow::{anyhow, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use crate::progress::{ProgressHandler, ToolkitProgress};
use crate::tools;

/// Packages installed into every kernel environment.
///
/// `ipykernel` provides the execution backend, `jupyter-server` the
/// HTTP/websocket surface the editor connects to.
pub const TOOLKIT_PACKAGES: &[&str] = &["ipykernel", "jupyter-server"];

/// A prepared toolkit installation inside a virtual environment.
#[derive(Debug, Clone)]
pub struct ToolkitInstallation {
    /// Concrete interpreter inside the venv (`bin/python`).
    pub python_path: PathBuf,
    /// Version of jupyter-server installed in the venv.
    pub toolkit_version: String,
}

/// Default base directory for kernel environment venvs.
pub fn default_venv_base_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("runebook")
        .join("envs")
}

/// Path of the Python executable inside a venv.
pub fn venv_python_path(venv_path: &Path) -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        venv_path.join("Scripts").join("python.exe")
    }
    #[cfg(not(target_os = "windows"))]
    {
        venv_path.join("bin").join("python")
    }
}

/// Ensure a virtual environment exists at `venv_path` with the kernel
/// toolkit installed, creating it from `interpreter` if needed.
///
/// Fast path: if the venv's interpreter exists and the toolkit imports,
/// nothing is installed. A venv directory without a working interpreter is
/// treated as a partial creation, removed, and rebuilt.
///
/// Returns the venv's concrete interpreter path (which may differ from the
/// symbolic `interpreter` the caller stored) and the installed
/// jupyter-server version.
pub async fn ensure_toolkit(
    interpreter: &Path,
    venv_path: &Path,
    handler: Arc<dyn ProgressHandler>,
) -> Result<ToolkitInstallation> {
    let python_path = venv_python_path(venv_path);

    handler.on_progress(ToolkitProgress::Starting {
        venv_path: venv_path.to_string_lossy().to_string(),
    });

    // Cache hit: interpreter present and toolkit importable
    if python_path.exists() {
        if let Ok(version) = query_toolkit_version(&python_path).await {
            info!("[toolkit] Using existing environment at {:?}", venv_path);
            handler.on_progress(ToolkitProgress::CacheHit {
                venv_path: venv_path.to_string_lossy().to_string(),
            });
            handler.on_progress(ToolkitProgress::Ready {
                venv_path: venv_path.to_string_lossy().to_string(),
                python_path: python_path.to_string_lossy().to_string(),
            });
            return Ok(ToolkitInstallation {
                python_path,
                toolkit_version: version,
            });
        }
        // Venv exists but the toolkit is missing or broken: reinstall into
        // it rather than recreating the whole environment.
        warn!(
            "[toolkit] Environment at {:?} is missing the toolkit, reinstalling",
            venv_path
        );
    } else {
        create_venv(interpreter, venv_path, &handler).await?;
    }

    install_into(&python_path, venv_path, TOOLKIT_PACKAGES, &handler).await?;

    let toolkit_version = query_toolkit_version(&python_path).await?;

    info!(
        "[toolkit] Environment ready at {:?} (jupyter-server {})",
        venv_path, toolkit_version
    );
    handler.on_progress(ToolkitProgress::Ready {
        venv_path: venv_path.to_string_lossy().to_string(),
        python_path: python_path.to_string_lossy().to_string(),
    });

    Ok(ToolkitInstallation {
        python_path,
        toolkit_version,
    })
}

/// Install additional packages into an existing environment.
pub async fn install_packages(venv_path: &Path, packages: &[String]) -> Result<()> {
    if packages.is_empty() {
        return Ok(());
    }

    info!(
        "[toolkit] Installing {} extra packages into {:?}",
        packages.len(),
        venv_path
    );

    let uv_path = tools::uv_path().await?;
    let python_path = venv_python_path(venv_path);

    let mut install_args = vec![
        "pip".to_string(),
        "install".to_string(),
        "--python".to_string(),
        python_path.to_string_lossy().to_string(),
    ];
    install_args.extend(packages.iter().cloned());

    let output = tokio::process::Command::new(&uv_path)
        .args(&install_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("Failed to install packages: {}", stderr));
    }

    info!("[toolkit] Extra packages installed");
    Ok(())
}

/// Remove an environment's venv directory.
pub async fn remove_venv(venv_path: &Path) -> Result<()> {
    if venv_path.exists() {
        tokio::fs::remove_dir_all(venv_path).await?;
    }
    Ok(())
}

/// Create a fresh venv, removing any partial directory first.
async fn create_venv(
    interpreter: &Path,
    venv_path: &Path,
    handler: &Arc<dyn ProgressHandler>,
) -> Result<()> {
    info!("[toolkit] Creating new environment at {:?}", venv_path);

    let uv_path = tools::uv_path().await?;

    if let Some(parent) = venv_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Remove partial environment
    if venv_path.exists() {
        tokio::fs::remove_dir_all(venv_path).await?;
    }

    handler.on_progress(ToolkitProgress::CreatingVenv);

    let output = tokio::process::Command::new(&uv_path)
        .arg("venv")
        .arg("--python")
        .arg(interpreter)
        .arg(venv_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let error_msg = format!("Failed to create virtual environment: {}", stderr);
        handler.on_progress(ToolkitProgress::Error {
            message: error_msg.clone(),
        });
        return Err(anyhow!(error_msg));
    }

    Ok(())
}

/// Install packages into the venv, removing it on failure so a later
/// attempt starts clean.
async fn install_into(
    python_path: &Path,
    venv_path: &Path,
    packages: &[&str],
    handler: &Arc<dyn ProgressHandler>,
) -> Result<()> {
    let uv_path = tools::uv_path().await?;

    let mut install_args = vec![
        "pip".to_string(),
        "install".to_string(),
        "--python".to_string(),
        python_path.to_string_lossy().to_string(),
    ];
    install_args.extend(packages.iter().map(|p| p.to_string()));

    handler.on_progress(ToolkitProgress::InstallingPackages {
        packages: packages.iter().map(|p| p.to_string()).collect(),
    });

    let output = tokio::process::Command::new(&uv_path)
        .args(&install_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        tokio::fs::remove_dir_all(venv_path).await.ok();
        let stderr = String::from_utf8_lossy(&output.stderr);
        let error_msg = format!("Failed to install toolkit: {}", stderr);
        handler.on_progress(ToolkitProgress::Error {
            message: error_msg.clone(),
        });
        return Err(anyhow!(error_msg));
    }

    Ok(())
}

/// Report the jupyter-server version installed in a venv.
async fn query_toolkit_version(python_path: &Path) -> Result<String> {
    let output = tokio::process::Command::new(python_path)
        .args([
            "-c",
            "import jupyter_server; print(jupyter_server.__version__)",
        ])
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("Toolkit not importable: {}", stderr));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if version.is_empty() {
        return Err(anyhow!("Toolkit reported an empty version"));
    }
    Ok(version)
}
