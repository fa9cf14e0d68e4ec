//! Kernel server process lifecycle.
//!
//! Each kernel environment can run at most one server process (a
//! jupyter-server instance launched from the environment's venv). This
//! crate owns those processes: it reserves ports, generates auth tokens,
//! spawns the server, probes readiness, and tears the process group down
//! on stop.
//!
//! Starts are idempotent per environment id: asking for a server that is
//! already running returns the existing connection info instead of
//! spawning a duplicate. Callers are expected to rely on this after an
//! editor restart, when their own belief about running servers has been
//! wiped but a real process may still be alive in a previous registry's
//! lifetime (a fresh registry starts empty, so a fresh start simply
//! replaces any orphan once the old process group is gone).

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

pub mod ports;

/// How long to wait for a spawned server to accept connections.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between readiness probe attempts.
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// How long a server gets to exit after SIGTERM before SIGKILL.
#[cfg(unix)]
const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(5);

/// Connection details for a running kernel server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Base URL of the server.
    pub url: String,
    /// Port the jupyter-server listens on.
    pub jupyter_port: u16,
    /// Port reserved for the environment's language server; the editor's
    /// LSP client connects here.
    pub lsp_port: u16,
    /// Auth token, when the server was started with one.
    pub token: Option<String>,
}

/// A spawned server process and its connection info.
struct RunningServer {
    info: ServerInfo,
    process: tokio::process::Child,
    #[cfg(unix)]
    process_group_id: Option<i32>,
}

impl RunningServer {
    /// Whether the process is still running.
    fn is_alive(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }

    /// Terminate the server: SIGTERM to the process group, escalating to
    /// SIGKILL if it doesn't exit in time. Non-Unix falls back to killing
    /// the direct child.
    async fn terminate(&mut self) -> Result<()> {
        #[cfg(unix)]
        if let Some(pgid) = self.process_group_id.take() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pgid), Signal::SIGTERM) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => {
                    // Signal failed; restore the pgid so a retry can escalate.
                    self.process_group_id = Some(pgid);
                    return Err(anyhow!("Failed to signal process group {}: {}", pgid, e));
                }
            }

            if tokio::time::timeout(GRACEFUL_SHUTDOWN, self.process.wait())
                .await
                .is_err()
            {
                warn!("[kernel-server] Server ignored SIGTERM, sending SIGKILL");
                let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
                self.process.wait().await?;
            }
            return Ok(());
        }

        self.process.kill().await?;
        Ok(())
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        // kill_on_drop only reaches the direct child; take the whole group
        // down so kernels forked by the server don't outlive it.
        #[cfg(unix)]
        if let Some(pgid) = self.process_group_id.take() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
}

/// Registry of running servers, keyed by environment id.
///
/// Start and stop requests serialize through the registry lock, so two
/// overlapping starts for the same id resolve to one spawned process and
/// one shared [`ServerInfo`].
#[derive(Default)]
pub struct ServerRegistry {
    servers: Mutex<HashMap<String, RunningServer>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a server for `env_id`, or return the existing connection info
    /// if one is already running (idempotent per id).
    pub async fn start(
        &self,
        interpreter: &Path,
        venv_path: &Path,
        env_id: &str,
    ) -> Result<ServerInfo> {
        let mut servers = self.servers.lock().await;

        if let Some(running) = servers.get_mut(env_id) {
            if running.is_alive() {
                info!(
                    "[kernel-server] Server already running for {}, reusing {}",
                    env_id, running.info.url
                );
                return Ok(running.info.clone());
            }
            warn!(
                "[kernel-server] Server for {} exited unexpectedly, replacing it",
                env_id
            );
            servers.remove(env_id);
        }

        let reserved = ports::reserve_loopback_ports(2)?;
        let (jupyter_port, lsp_port) = (reserved[0], reserved[1]);
        let token = Uuid::new_v4().to_string();
        let url = format!("http://127.0.0.1:{}", jupyter_port);

        info!(
            "[kernel-server] Starting server for {} from {:?} on port {}",
            env_id, interpreter, jupyter_port
        );

        let cwd = dirs::home_dir().unwrap_or_else(std::env::temp_dir);

        let mut cmd = tokio::process::Command::new(interpreter);
        cmd.args(["-m", "jupyter_server", "--no-browser"])
            .arg("--ServerApp.ip=127.0.0.1")
            .arg(format!("--ServerApp.port={}", jupyter_port))
            .arg("--ServerApp.port_retries=0")
            .arg(format!("--IdentityProvider.token={}", token))
            .current_dir(&cwd)
            .env("VIRTUAL_ENV", venv_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let process = cmd.spawn()?;

        #[cfg(unix)]
        let process_group_id = process.id().map(|pid| pid as i32);

        let mut running = RunningServer {
            info: ServerInfo {
                url,
                jupyter_port,
                lsp_port,
                token: Some(token),
            },
            process,
            #[cfg(unix)]
            process_group_id,
        };

        if let Err(e) = wait_for_port(jupyter_port, STARTUP_TIMEOUT).await {
            running.terminate().await.ok();
            return Err(anyhow!(
                "Server for {} did not become ready on port {}: {}",
                env_id,
                jupyter_port,
                e
            ));
        }

        let server_info = running.info.clone();
        servers.insert(env_id.to_string(), running);

        info!(
            "[kernel-server] Server ready for {} at {}",
            env_id, server_info.url
        );
        Ok(server_info)
    }

    /// Stop the server for `env_id`.
    ///
    /// Stopping an id with no registered server is a success; the caller's
    /// belief and ours can legitimately disagree after restarts.
    pub async fn stop(&self, env_id: &str) -> Result<()> {
        let mut servers = self.servers.lock().await;

        let Some(mut running) = servers.remove(env_id) else {
            warn!(
                "[kernel-server] No server registered for {}, nothing to stop",
                env_id
            );
            return Ok(());
        };

        info!("[kernel-server] Stopping server for {}", env_id);

        if let Err(e) = running.terminate().await {
            // Keep the entry so the server isn't silently orphaned.
            servers.insert(env_id.to_string(), running);
            return Err(e);
        }

        info!("[kernel-server] Server stopped for {}", env_id);
        Ok(())
    }

    /// Connection info for `env_id`, if a live server is registered.
    pub async fn info(&self, env_id: &str) -> Option<ServerInfo> {
        let mut servers = self.servers.lock().await;
        let running = servers.get_mut(env_id)?;
        running.is_alive().then(|| running.info.clone())
    }

    /// Ids of all registered servers.
    pub async fn running_ids(&self) -> Vec<String> {
        self.servers.lock().await.keys().cloned().collect()
    }
}

/// Poll a loopback port until something accepts, or time out.
async fn wait_for_port(port: u16, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match tokio::net::TcpStream::connect(("127.0.0.1", port)).await {
            Ok(_) => return Ok(()),
            Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(PROBE_INTERVAL).await;
            }
            Err(e) => {
                return Err(anyhow!(
                    "No listener after {}s: {}",
                    timeout.as_secs(),
                    e
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_unknown_id_is_ok() {
        let registry = ServerRegistry::new();
        assert!(registry.stop("no-such-env").await.is_ok());
        assert!(registry.running_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_info_unknown_id_is_none() {
        let registry = ServerRegistry::new();
        assert!(registry.info("no-such-env").await.is_none());
    }

    #[tokio::test]
    async fn test_start_with_missing_interpreter_fails() {
        let registry = ServerRegistry::new();
        let result = registry
            .start(
                Path::new("/nonexistent/python"),
                Path::new("/nonexistent/venv"),
                "env-1",
            )
            .await;

        assert!(result.is_err());
        assert!(registry.running_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_port_succeeds_with_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        wait_for_port(port, Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_info_serializes_token() {
        let info = ServerInfo {
            url: "http://127.0.0.1:8888".to_string(),
            jupyter_port: 8888,
            lsp_port: 8889,
            token: Some("secret".to_string()),
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["jupyter_port"], 8888);
        assert_eq!(json["token"], "secret");
    }
}
