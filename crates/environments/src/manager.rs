//! The environment lifecycle manager.
//!
//! One manager instance owns the in-memory registry of environments and
//! is the only writer to both the registry and the store. Operations are
//! async and may interleave at their await points (store saves,
//! collaborator calls), but every registry access is a short,
//! non-suspending critical section, so snapshots are always consistent.
//!
//! Ordering invariant: a mutation is applied to the registry, then
//! persisted, then announced. A change notification never fires before
//! its persist has completed, so a listener that re-reads storage on
//! notification sees the data the notification was about.
//!
//! Cancellation: tokens are checked at operation entry and at phase
//! boundaries, never mid-I/O. An operation that observes cancellation
//! before any persisted mutation fails with
//! [`EnvironmentError::Cancelled`] and leaves state untouched; once a
//! persist has happened the operation runs to completion.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::{broadcast, OnceCell};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::collaborators::{ServerLifecycle, ToolkitInstaller};
use crate::error::EnvironmentError;
use crate::model::{
    venv_path_for, CreateEnvironmentOptions, Environment, EnvironmentStatus, EnvironmentUpdate,
    EnvironmentWithStatus, PythonInterpreter,
};
use crate::store::EnvironmentStore;

type Result<T> = std::result::Result<T, EnvironmentError>;

/// Owns the environment registry and orchestrates its lifecycle.
pub struct EnvironmentManager {
    store: Arc<dyn EnvironmentStore>,
    installer: Arc<dyn ToolkitInstaller>,
    server_client: Arc<dyn ServerLifecycle>,
    venv_base_dir: PathBuf,
    /// Authoritative runtime state, keyed by environment id.
    registry: Mutex<HashMap<String, Environment>>,
    /// Ids with a start in flight; backs the `Starting` status.
    starting: Mutex<HashSet<String>>,
    init: OnceCell<()>,
    changed_tx: broadcast::Sender<()>,
}

/// Marks an id as starting for the guard's lifetime, announcing the
/// status flip in both directions.
struct StartingGuard<'a> {
    starting: &'a Mutex<HashSet<String>>,
    changed_tx: &'a broadcast::Sender<()>,
    id: String,
}

impl<'a> StartingGuard<'a> {
    fn enter(
        starting: &'a Mutex<HashSet<String>>,
        changed_tx: &'a broadcast::Sender<()>,
        id: &str,
    ) -> Self {
        starting.lock().unwrap().insert(id.to_string());
        let _ = changed_tx.send(());
        Self {
            starting,
            changed_tx,
            id: id.to_string(),
        }
    }
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        self.starting.lock().unwrap().remove(&self.id);
        let _ = self.changed_tx.send(());
    }
}

impl EnvironmentManager {
    /// Create a manager with the default venv base directory.
    pub fn new(
        store: Arc<dyn EnvironmentStore>,
        installer: Arc<dyn ToolkitInstaller>,
        server_client: Arc<dyn ServerLifecycle>,
    ) -> Self {
        Self::with_venv_base_dir(
            store,
            installer,
            server_client,
            toolkit_env::uv::default_venv_base_dir(),
        )
    }

    /// Create a manager that places venvs under `venv_base_dir`.
    pub fn with_venv_base_dir(
        store: Arc<dyn EnvironmentStore>,
        installer: Arc<dyn ToolkitInstaller>,
        server_client: Arc<dyn ServerLifecycle>,
        venv_base_dir: PathBuf,
    ) -> Self {
        let (changed_tx, _) = broadcast::channel(16);
        Self {
            store,
            installer,
            server_client,
            venv_base_dir,
            registry: Mutex::new(HashMap::new()),
            starting: Mutex::new(HashSet::new()),
            init: OnceCell::new(),
            changed_tx,
        }
    }

    /// Subscribe to change notifications.
    ///
    /// One zero-payload event fires after every persisted registry
    /// mutation (and around transient `Starting` flips); receivers
    /// re-query. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changed_tx.subscribe()
    }

    /// Load persisted environments into the registry.
    ///
    /// Runs at most once per manager; concurrent and repeated calls await
    /// the same in-flight load instead of re-triggering it.
    pub async fn initialize(&self) {
        self.init
            .get_or_init(|| async {
                let environments = self.store.load().await;
                let count = environments.len();
                {
                    let mut registry = self.registry.lock().unwrap();
                    registry.clear();
                    for env in environments {
                        registry.insert(env.id.clone(), env);
                    }
                }
                info!("[env-manager] Initialized with {} environments", count);
                self.notify_changed();
            })
            .await;
    }

    /// Wait for initialization, triggering it if it never ran.
    pub async fn initialized(&self) {
        self.initialize().await;
    }

    /// Create a new environment and persist it.
    ///
    /// The id and venv path are allocated here; a cancellation observed at
    /// any point before the record is committed fails cleanly with no
    /// mutation.
    pub async fn create_environment(
        &self,
        options: CreateEnvironmentOptions,
        token: &CancellationToken,
    ) -> Result<Environment> {
        if token.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }

        let id = Uuid::new_v4().to_string();
        let venv_path = venv_path_for(&self.venv_base_dir, &id);
        let now = Utc::now();

        // A cancel landing during allocation must not leave a
        // half-registered environment behind.
        if token.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }

        let environment = Environment {
            id: id.clone(),
            name: options.name,
            python_interpreter: options.python_interpreter,
            venv_path,
            created_at: now,
            last_used_at: now,
            packages: options.packages,
            toolkit_version: None,
            description: options.description,
            server_info: None,
        };

        let snapshot = {
            let mut registry = self.registry.lock().unwrap();
            registry.insert(id.clone(), environment.clone());
            Self::snapshot_locked(&registry)
        };
        self.persist(&snapshot).await?;
        self.notify_changed();

        info!(
            "[env-manager] Created environment {} ({})",
            environment.name, environment.id
        );
        Ok(environment)
    }

    /// Snapshot of all environments, in creation order.
    pub fn list_environments(&self) -> Vec<Environment> {
        Self::snapshot_locked(&self.registry.lock().unwrap())
    }

    /// Look up one environment. `None` when the id is unknown.
    pub fn get_environment(&self, id: &str) -> Option<Environment> {
        self.registry.lock().unwrap().get(id).cloned()
    }

    /// Look up one environment with its derived status.
    pub fn get_environment_with_status(&self, id: &str) -> Option<EnvironmentWithStatus> {
        let environment = self.get_environment(id)?;
        let status = if environment.server_info.is_some() {
            EnvironmentStatus::Running
        } else if self.starting.lock().unwrap().contains(id) {
            EnvironmentStatus::Starting
        } else {
            EnvironmentStatus::Stopped
        };
        Some(EnvironmentWithStatus {
            environment,
            status,
        })
    }

    /// Apply a partial patch to an environment.
    pub async fn update_environment(&self, id: &str, update: EnvironmentUpdate) -> Result<()> {
        let snapshot = {
            let mut registry = self.registry.lock().unwrap();
            let env = registry
                .get_mut(id)
                .ok_or_else(|| EnvironmentError::NotFound(id.to_string()))?;
            if let Some(name) = update.name {
                env.name = name;
            }
            if let Some(packages) = update.packages {
                env.packages = Some(packages);
            }
            if let Some(description) = update.description {
                env.description = Some(description);
            }
            Self::snapshot_locked(&registry)
        };
        self.persist(&snapshot).await?;
        self.notify_changed();
        Ok(())
    }

    /// Delete an environment, stopping its server first.
    ///
    /// If the stop fails the delete fails with it: dropping the record
    /// while its server may still be alive would leak the process.
    pub async fn delete_environment(&self, id: &str, token: &CancellationToken) -> Result<()> {
        let environment = self
            .get_environment(id)
            .ok_or_else(|| EnvironmentError::NotFound(id.to_string()))?;

        if token.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }

        if environment.server_info.is_some() {
            self.stop_server(id, token).await?;
        }

        if token.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }

        let snapshot = {
            let mut registry = self.registry.lock().unwrap();
            if registry.remove(id).is_none() {
                return Err(EnvironmentError::NotFound(id.to_string()));
            }
            Self::snapshot_locked(&registry)
        };
        self.persist(&snapshot).await?;
        self.notify_changed();

        info!(
            "[env-manager] Deleted environment {} ({})",
            environment.name, id
        );
        Ok(())
    }

    /// Start the environment's server.
    ///
    /// Installs the toolkit (which may resolve the stored interpreter to a
    /// different concrete one), installs any extra packages, then asks the
    /// server client to start. The client call is never skipped based on a
    /// cached belief that a server is already running: after an editor
    /// restart that belief is wiped while a real process may be alive, and
    /// the client's start is idempotent per id. Any failure leaves the
    /// registry untouched.
    pub async fn start_server(&self, id: &str, token: &CancellationToken) -> Result<()> {
        let environment = self
            .get_environment(id)
            .ok_or_else(|| EnvironmentError::NotFound(id.to_string()))?;

        if token.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }

        let _starting = StartingGuard::enter(&self.starting, &self.changed_tx, id);

        let install = self
            .installer
            .ensure_venv_and_toolkit(
                &environment.python_interpreter.path,
                &environment.venv_path,
                token,
            )
            .await
            .map_err(|e| self.collaborator_failure("Toolkit installation failed", &environment, e))?;

        if token.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }

        if let Some(packages) = environment.packages.as_deref() {
            if !packages.is_empty() {
                self.installer
                    .install_additional_packages(&environment.venv_path, packages, token)
                    .await
                    .map_err(|e| {
                        self.collaborator_failure("Package installation failed", &environment, e)
                    })?;
            }
        }

        if token.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }

        let server_info = self
            .server_client
            .start_server(
                &install.python_interpreter,
                &environment.venv_path,
                id,
                token,
            )
            .await
            .map_err(|e| self.collaborator_failure("Server start failed", &environment, e))?;

        let snapshot = {
            let mut registry = self.registry.lock().unwrap();
            let Some(env) = registry.get_mut(id) else {
                warn!(
                    "[env-manager] Environment {} removed during start, dropping result",
                    id
                );
                return Err(EnvironmentError::NotFound(id.to_string()));
            };
            env.python_interpreter = PythonInterpreter::from_path(install.python_interpreter);
            env.toolkit_version = Some(install.toolkit_version);
            env.server_info = Some(server_info);
            env.last_used_at = Utc::now();
            Self::snapshot_locked(&registry)
        };
        self.persist(&snapshot).await?;
        self.notify_changed();

        info!(
            "[env-manager] Server running for {} ({})",
            environment.name, id
        );
        Ok(())
    }

    /// Stop the environment's server.
    ///
    /// A no-op success when no server is believed running. If the client's
    /// stop fails, `server_info` stays set: optimistically clearing state
    /// for a server that may still be running would orphan it.
    pub async fn stop_server(&self, id: &str, token: &CancellationToken) -> Result<()> {
        let environment = self
            .get_environment(id)
            .ok_or_else(|| EnvironmentError::NotFound(id.to_string()))?;

        if environment.server_info.is_none() {
            return Ok(());
        }

        if token.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }

        self.server_client
            .stop_server(id, token)
            .await
            .map_err(|e| self.collaborator_failure("Server stop failed", &environment, e))?;

        if token.is_cancelled() {
            return Err(EnvironmentError::Cancelled);
        }

        let snapshot = {
            let mut registry = self.registry.lock().unwrap();
            if let Some(env) = registry.get_mut(id) {
                env.server_info = None;
            }
            Self::snapshot_locked(&registry)
        };
        self.persist(&snapshot).await?;
        self.notify_changed();

        info!(
            "[env-manager] Server stopped for {} ({})",
            environment.name, id
        );
        Ok(())
    }

    /// Stop then start, with the same token.
    ///
    /// No extra atomicity beyond what stop and start provide: if the stop
    /// succeeds and the start fails, the environment ends up stopped,
    /// which is the safe terminal state.
    pub async fn restart_server(&self, id: &str, token: &CancellationToken) -> Result<()> {
        self.stop_server(id, token).await?;
        self.start_server(id, token).await
    }

    /// Best-effort touch of `last_used_at`.
    ///
    /// Unknown ids are ignored and persistence failures are logged rather
    /// than returned; this is called frequently from low-stakes paths
    /// where a loud failure would only be noise.
    pub async fn update_last_used(&self, id: &str) {
        let snapshot = {
            let mut registry = self.registry.lock().unwrap();
            let Some(env) = registry.get_mut(id) else {
                return;
            };
            env.last_used_at = Utc::now();
            Self::snapshot_locked(&registry)
        };
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(
                "[env-manager] Failed to persist last-used update for {}: {:#}",
                id, e
            );
            return;
        }
        self.notify_changed();
    }

    fn snapshot_locked(registry: &HashMap<String, Environment>) -> Vec<Environment> {
        let mut environments: Vec<Environment> = registry.values().cloned().collect();
        environments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        environments
    }

    async fn persist(&self, snapshot: &[Environment]) -> Result<()> {
        self.store.save(snapshot).await.map_err(|e| {
            error!("[env-manager] Failed to persist environments: {:#}", e);
            EnvironmentError::Persistence(e)
        })
    }

    fn notify_changed(&self) {
        let _ = self.changed_tx.send(());
    }

    fn collaborator_failure(
        &self,
        context: &str,
        environment: &Environment,
        source: anyhow::Error,
    ) -> EnvironmentError {
        error!(
            "[env-manager] {} for environment {} ({}): {:#}",
            context, environment.name, environment.id, source
        );
        EnvironmentError::Collaborator {
            context: format!("{} for environment {}", context, environment.name),
            source,
        }
    }
}
