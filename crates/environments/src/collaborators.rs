//! Collaborator contracts the manager drives.
//!
//! The manager never shells out or touches the network itself; it
//! orchestrates these two injected collaborators. Both take a
//! cancellation token by contract, though implementations are free to
//! treat a call in flight as uncancellable (tokens are only consulted at
//! well-defined points, never mid-I/O).

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::model::ServerInfo;

/// Result of ensuring a venv and toolkit for an environment.
#[derive(Debug, Clone)]
pub struct ToolkitInstall {
    /// Concrete interpreter resolved by the installer. May differ from the
    /// interpreter the caller stored (a symbolic `python3` resolves to the
    /// venv's own binary); callers write it back into the record.
    pub python_interpreter: PathBuf,
    /// Installed toolkit version.
    pub toolkit_version: String,
}

/// Ensures virtual environments exist and carry the kernel toolkit.
#[async_trait]
pub trait ToolkitInstaller: Send + Sync {
    /// Ensure `venv_path` exists and has the toolkit installed, creating
    /// the venv from `interpreter` if needed. Called before every server
    /// start.
    async fn ensure_venv_and_toolkit(
        &self,
        interpreter: &Path,
        venv_path: &Path,
        token: &CancellationToken,
    ) -> Result<ToolkitInstall>;

    /// Install user-requested extra packages into an existing venv.
    async fn install_additional_packages(
        &self,
        venv_path: &Path,
        packages: &[String],
        token: &CancellationToken,
    ) -> Result<()>;
}

/// Starts and stops kernel server processes.
#[async_trait]
pub trait ServerLifecycle: Send + Sync {
    /// Start a server for the environment.
    ///
    /// Idempotent per `env_id`: if a server is already running for the id,
    /// returns its existing connection info instead of spawning a
    /// duplicate. Callers lean on this rather than trusting their own
    /// belief about what is running, which can be stale after a restart.
    async fn start_server(
        &self,
        interpreter: &Path,
        venv_path: &Path,
        env_id: &str,
        token: &CancellationToken,
    ) -> Result<ServerInfo>;

    /// Stop the server for `env_id`, if any.
    async fn stop_server(&self, env_id: &str, token: &CancellationToken) -> Result<()>;
}
