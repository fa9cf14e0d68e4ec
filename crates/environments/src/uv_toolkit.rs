//! Production [`ToolkitInstaller`] backed by the `toolkit-env` crate.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use toolkit_env::progress::{LogHandler, ProgressHandler};

use crate::collaborators::{ToolkitInstall, ToolkitInstaller};

/// Installs the kernel toolkit into uv-managed venvs.
///
/// The token is accepted for contract parity but unused: there are no
/// cancellation points between entry and the underlying uv invocation,
/// which runs to completion once started.
pub struct UvToolkitInstaller {
    progress: Arc<dyn ProgressHandler>,
}

impl UvToolkitInstaller {
    pub fn new() -> Self {
        Self::with_progress(Arc::new(LogHandler))
    }

    /// Route toolkit progress to a custom handler (e.g. a UI channel).
    pub fn with_progress(progress: Arc<dyn ProgressHandler>) -> Self {
        Self { progress }
    }
}

impl Default for UvToolkitInstaller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolkitInstaller for UvToolkitInstaller {
    async fn ensure_venv_and_toolkit(
        &self,
        interpreter: &Path,
        venv_path: &Path,
        _token: &CancellationToken,
    ) -> Result<ToolkitInstall> {
        let install =
            toolkit_env::uv::ensure_toolkit(interpreter, venv_path, self.progress.clone()).await?;
        Ok(ToolkitInstall {
            python_interpreter: install.python_path,
            toolkit_version: install.toolkit_version,
        })
    }

    async fn install_additional_packages(
        &self,
        venv_path: &Path,
        packages: &[String],
        _token: &CancellationToken,
    ) -> Result<()> {
        toolkit_env::uv::install_packages(venv_path, packages).await
    }
}
