//! Production [`ServerLifecycle`] backed by the `kernel-server` crate.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use kernel_server::ServerRegistry;

use crate::collaborators::ServerLifecycle;
use crate::model::ServerInfo;

/// Runs kernel servers as local child processes.
///
/// Idempotency per environment id comes from the underlying
/// [`ServerRegistry`]. The token is accepted for contract parity but
/// unused: a spawn in flight runs to readiness or failure.
#[derive(Default)]
pub struct LocalServerClient {
    registry: ServerRegistry,
}

impl LocalServerClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServerLifecycle for LocalServerClient {
    async fn start_server(
        &self,
        interpreter: &Path,
        venv_path: &Path,
        env_id: &str,
        _token: &CancellationToken,
    ) -> Result<ServerInfo> {
        let info = self.registry.start(interpreter, venv_path, env_id).await?;
        Ok(ServerInfo {
            url: info.url,
            jupyter_port: info.jupyter_port,
            lsp_port: info.lsp_port,
            token: info.token,
        })
    }

    async fn stop_server(&self, env_id: &str, _token: &CancellationToken) -> Result<()> {
        self.registry.stop(env_id).await
    }
}
