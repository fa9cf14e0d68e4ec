//! Integration tests for the environment lifecycle manager.
//!
//! Collaborators are replaced with recording fakes so every test can
//! assert exactly which installer/server calls happened. Most tests use
//! an in-memory store that mimics the persisted schema (server info is
//! stripped on save); the reload scenario uses the real file-backed store
//! to exercise the full serialization round trip.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use environments::{
    CreateEnvironmentOptions, Environment, EnvironmentError, EnvironmentManager,
    EnvironmentStatus, EnvironmentStore, EnvironmentTreeProvider, EnvironmentUpdate,
    JsonFileStore, PythonInterpreter, ServerInfo, ServerLifecycle, ToolkitInstall,
    ToolkitInstaller,
};

// =============================================================================
// Fakes
// =============================================================================

/// In-memory store that mimics the persisted schema: server info never
/// survives a save.
#[derive(Default)]
struct RecordingStore {
    records: Mutex<Vec<Environment>>,
    load_calls: AtomicUsize,
    save_calls: AtomicUsize,
}

#[async_trait]
impl EnvironmentStore for RecordingStore {
    async fn load(&self) -> Vec<Environment> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().clone()
    }

    async fn save(&self, environments: &[Environment]) -> anyhow::Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let stripped = environments
            .iter()
            .map(|env| Environment {
                server_info: None,
                ..env.clone()
            })
            .collect();
        *self.records.lock().unwrap() = stripped;
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.records.lock().unwrap().clear();
        Ok(())
    }
}

struct MockInstaller {
    toolkit_version: String,
    /// When set, `ensure_venv_and_toolkit` reports this interpreter
    /// instead of echoing back the one it was given.
    resolved_interpreter: Option<PathBuf>,
    fail_package_install: bool,
    ensure_calls: AtomicUsize,
    installed_packages: Mutex<Vec<Vec<String>>>,
}

impl Default for MockInstaller {
    fn default() -> Self {
        Self {
            toolkit_version: "0.2.30".to_string(),
            resolved_interpreter: None,
            fail_package_install: false,
            ensure_calls: AtomicUsize::new(0),
            installed_packages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ToolkitInstaller for MockInstaller {
    async fn ensure_venv_and_toolkit(
        &self,
        interpreter: &Path,
        _venv_path: &Path,
        _token: &CancellationToken,
    ) -> anyhow::Result<ToolkitInstall> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ToolkitInstall {
            python_interpreter: self
                .resolved_interpreter
                .clone()
                .unwrap_or_else(|| interpreter.to_path_buf()),
            toolkit_version: self.toolkit_version.clone(),
        })
    }

    async fn install_additional_packages(
        &self,
        _venv_path: &Path,
        packages: &[String],
        _token: &CancellationToken,
    ) -> anyhow::Result<()> {
        if self.fail_package_install {
            anyhow::bail!("package install exploded");
        }
        self.installed_packages
            .lock()
            .unwrap()
            .push(packages.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct MockServerClient {
    /// Starts beyond this count fail (`0` = every start fails).
    fail_start_after: Option<usize>,
    fail_stop: bool,
    /// Token to cancel when a stop request arrives, to simulate a user
    /// cancelling at a phase boundary.
    cancel_on_stop: Mutex<Option<CancellationToken>>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    stopped_ids: Mutex<Vec<String>>,
}

#[async_trait]
impl ServerLifecycle for MockServerClient {
    async fn start_server(
        &self,
        _interpreter: &Path,
        _venv_path: &Path,
        _env_id: &str,
        _token: &CancellationToken,
    ) -> anyhow::Result<ServerInfo> {
        let call = self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_start_after {
            if call >= limit {
                anyhow::bail!("server refused to start");
            }
        }
        Ok(ServerInfo {
            url: "http://localhost:8888".to_string(),
            jupyter_port: 8888,
            lsp_port: 8889,
            token: None,
        })
    }

    async fn stop_server(&self, env_id: &str, _token: &CancellationToken) -> anyhow::Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            anyhow::bail!("stop failed");
        }
        if let Some(token) = self.cancel_on_stop.lock().unwrap().as_ref() {
            token.cancel();
        }
        self.stopped_ids.lock().unwrap().push(env_id.to_string());
        Ok(())
    }
}

// =============================================================================
// Fixture
// =============================================================================

struct Fixture {
    manager: Arc<EnvironmentManager>,
    store: Arc<RecordingStore>,
    installer: Arc<MockInstaller>,
    server: Arc<MockServerClient>,
}

fn fixture() -> Fixture {
    fixture_with(MockInstaller::default(), MockServerClient::default())
}

fn fixture_with(installer: MockInstaller, server: MockServerClient) -> Fixture {
    let store = Arc::new(RecordingStore::default());
    let installer = Arc::new(installer);
    let server = Arc::new(server);
    let manager = Arc::new(EnvironmentManager::with_venv_base_dir(
        store.clone(),
        installer.clone(),
        server.clone(),
        PathBuf::from("/cache/envs"),
    ));
    Fixture {
        manager,
        store,
        installer,
        server,
    }
}

async fn create_data_science_env(manager: &EnvironmentManager) -> Environment {
    manager
        .create_environment(
            CreateEnvironmentOptions {
                name: "Data Science".to_string(),
                python_interpreter: PythonInterpreter::from_path("/usr/bin/python3"),
                packages: None,
                description: None,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap()
}

// =============================================================================
// Creation and listing
// =============================================================================

#[tokio::test]
async fn test_create_environment_lists_one_record() {
    let fx = fixture();
    fx.manager.initialize().await;

    let env = create_data_science_env(&fx.manager).await;

    let listed = fx.manager.list_environments();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Data Science");
    assert!(listed[0]
        .venv_path
        .to_string_lossy()
        .contains(&env.id));
    assert!(listed[0].packages.is_none());
    assert!(listed[0].toolkit_version.is_none());
    assert_eq!(listed[0].created_at, listed[0].last_used_at);
}

#[tokio::test]
async fn test_create_persists_before_returning() {
    let fx = fixture();
    fx.manager.initialize().await;

    let env = create_data_science_env(&fx.manager).await;

    let persisted = fx.store.records.lock().unwrap().clone();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, env.id);
}

#[tokio::test]
async fn test_cancelled_create_makes_no_mutation() {
    let fx = fixture();
    fx.manager.initialize().await;
    let saves_before = fx.store.save_calls.load(Ordering::SeqCst);

    let token = CancellationToken::new();
    token.cancel();

    let result = fx
        .manager
        .create_environment(
            CreateEnvironmentOptions {
                name: "Doomed".to_string(),
                python_interpreter: PythonInterpreter::from_path("/usr/bin/python3"),
                packages: None,
                description: None,
            },
            &token,
        )
        .await;

    assert!(matches!(result, Err(EnvironmentError::Cancelled)));
    assert!(fx.manager.list_environments().is_empty());
    assert_eq!(fx.store.save_calls.load(Ordering::SeqCst), saves_before);
}

#[tokio::test]
async fn test_get_environment_unknown_id_is_none() {
    let fx = fixture();
    fx.manager.initialize().await;
    assert!(fx.manager.get_environment("nope").is_none());
    assert!(fx.manager.get_environment_with_status("nope").is_none());
}

// =============================================================================
// Initialization
// =============================================================================

#[tokio::test]
async fn test_initialize_loads_store_exactly_once() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;

    fx.manager.initialize().await;
    fx.manager.initialized().await;

    assert_eq!(fx.store.load_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.manager.list_environments().len(), 1);
    assert!(fx.manager.get_environment(&env.id).is_some());
}

#[tokio::test]
async fn test_concurrent_initialize_shares_one_load() {
    let fx = fixture();
    futures::join!(fx.manager.initialize(), fx.manager.initialized());
    assert_eq!(fx.store.load_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_patches_only_provided_fields() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;

    fx.manager
        .update_environment(
            &env.id,
            EnvironmentUpdate {
                packages: Some(vec!["numpy".to_string(), "pandas".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let updated = fx.manager.get_environment(&env.id).unwrap();
    assert_eq!(
        updated.packages,
        Some(vec!["numpy".to_string(), "pandas".to_string()])
    );
    assert_eq!(updated.name, "Data Science");

    fx.manager
        .update_environment(
            &env.id,
            EnvironmentUpdate {
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let renamed = fx.manager.get_environment(&env.id).unwrap();
    assert_eq!(renamed.name, "Renamed");
    assert_eq!(
        renamed.packages,
        Some(vec!["numpy".to_string(), "pandas".to_string()])
    );
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let fx = fixture();
    fx.manager.initialize().await;

    let result = fx
        .manager
        .update_environment("nope", EnvironmentUpdate::default())
        .await;
    assert!(matches!(result, Err(EnvironmentError::NotFound(_))));
}

// =============================================================================
// Start
// =============================================================================

#[tokio::test]
async fn test_start_sets_running_status_and_toolkit_version() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;

    fx.manager
        .start_server(&env.id, &CancellationToken::new())
        .await
        .unwrap();

    let with_status = fx.manager.get_environment_with_status(&env.id).unwrap();
    assert_eq!(with_status.status, EnvironmentStatus::Running);
    assert_eq!(
        with_status.environment.toolkit_version.as_deref(),
        Some("0.2.30")
    );
    let server = with_status.environment.server_info.unwrap();
    assert_eq!(server.url, "http://localhost:8888");
    assert_eq!(server.jupyter_port, 8888);
    assert_eq!(server.lsp_port, 8889);
    assert!(with_status.environment.last_used_at > env.created_at);
}

#[tokio::test]
async fn test_start_writes_back_resolved_interpreter() {
    let fx = fixture_with(
        MockInstaller {
            resolved_interpreter: Some(PathBuf::from("/cache/envs/x/bin/python")),
            ..Default::default()
        },
        MockServerClient::default(),
    );
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;

    fx.manager
        .start_server(&env.id, &CancellationToken::new())
        .await
        .unwrap();

    let updated = fx.manager.get_environment(&env.id).unwrap();
    assert_eq!(
        updated.python_interpreter.path,
        PathBuf::from("/cache/envs/x/bin/python")
    );
}

#[tokio::test]
async fn test_start_installs_configured_packages() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = fx
        .manager
        .create_environment(
            CreateEnvironmentOptions {
                name: "With packages".to_string(),
                python_interpreter: PythonInterpreter::from_path("/usr/bin/python3"),
                packages: Some(vec!["polars".to_string()]),
                description: None,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    fx.manager
        .start_server(&env.id, &CancellationToken::new())
        .await
        .unwrap();

    let installs = fx.installer.installed_packages.lock().unwrap().clone();
    assert_eq!(installs, vec![vec!["polars".to_string()]]);
}

#[tokio::test]
async fn test_start_always_asks_the_server_client() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;
    let token = CancellationToken::new();

    fx.manager.start_server(&env.id, &token).await.unwrap();
    // Second start must reach the client even though we already believe a
    // server is running; that belief can be stale after a restart.
    fx.manager.start_server(&env.id, &token).await.unwrap();

    assert_eq!(fx.server.start_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_start_failure_leaves_registry_unchanged() {
    let fx = fixture_with(
        MockInstaller::default(),
        MockServerClient {
            fail_start_after: Some(0),
            ..Default::default()
        },
    );
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;
    let saves_before = fx.store.save_calls.load(Ordering::SeqCst);

    let result = fx
        .manager
        .start_server(&env.id, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(EnvironmentError::Collaborator { .. })));
    let after = fx.manager.get_environment_with_status(&env.id).unwrap();
    assert_eq!(after.status, EnvironmentStatus::Stopped);
    assert!(after.environment.server_info.is_none());
    assert!(after.environment.toolkit_version.is_none());
    assert_eq!(after.environment.last_used_at, env.last_used_at);
    assert_eq!(fx.store.save_calls.load(Ordering::SeqCst), saves_before);
}

#[tokio::test]
async fn test_package_install_failure_prevents_server_start() {
    let fx = fixture_with(
        MockInstaller {
            fail_package_install: true,
            ..Default::default()
        },
        MockServerClient::default(),
    );
    fx.manager.initialize().await;
    let env = fx
        .manager
        .create_environment(
            CreateEnvironmentOptions {
                name: "Broken packages".to_string(),
                python_interpreter: PythonInterpreter::from_path("/usr/bin/python3"),
                packages: Some(vec!["not-a-package".to_string()]),
                description: None,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let result = fx
        .manager
        .start_server(&env.id, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(EnvironmentError::Collaborator { .. })));
    assert_eq!(fx.server.start_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_start_unknown_id_is_not_found() {
    let fx = fixture();
    fx.manager.initialize().await;

    let result = fx
        .manager
        .start_server("nope", &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(EnvironmentError::NotFound(_))));
    assert_eq!(fx.installer.ensure_calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Stop and restart
// =============================================================================

#[tokio::test]
async fn test_stop_without_server_skips_the_client() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;

    fx.manager
        .stop_server(&env.id, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fx.server.stop_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_clears_server_info() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;
    let token = CancellationToken::new();

    fx.manager.start_server(&env.id, &token).await.unwrap();
    fx.manager.stop_server(&env.id, &token).await.unwrap();

    let after = fx.manager.get_environment_with_status(&env.id).unwrap();
    assert_eq!(after.status, EnvironmentStatus::Stopped);
    assert!(after.environment.server_info.is_none());
    // Toolkit version is knowledge about the venv, not the server.
    assert_eq!(after.environment.toolkit_version.as_deref(), Some("0.2.30"));
}

#[tokio::test]
async fn test_stop_failure_keeps_server_info() {
    let fx = fixture_with(
        MockInstaller::default(),
        MockServerClient {
            fail_stop: true,
            ..Default::default()
        },
    );
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;
    let token = CancellationToken::new();

    fx.manager.start_server(&env.id, &token).await.unwrap();
    let result = fx.manager.stop_server(&env.id, &token).await;

    assert!(matches!(result, Err(EnvironmentError::Collaborator { .. })));
    let after = fx.manager.get_environment_with_status(&env.id).unwrap();
    assert_eq!(after.status, EnvironmentStatus::Running);
}

#[tokio::test]
async fn test_restart_ending_in_failed_start_is_stopped() {
    let fx = fixture_with(
        MockInstaller::default(),
        MockServerClient {
            fail_start_after: Some(1),
            ..Default::default()
        },
    );
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;
    let token = CancellationToken::new();

    fx.manager.start_server(&env.id, &token).await.unwrap();
    let result = fx.manager.restart_server(&env.id, &token).await;

    assert!(result.is_err());
    let after = fx.manager.get_environment_with_status(&env.id).unwrap();
    assert_eq!(after.status, EnvironmentStatus::Stopped);
    assert!(after.environment.server_info.is_none());
}

#[tokio::test]
async fn test_restart_stops_then_starts() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;
    let token = CancellationToken::new();

    fx.manager.start_server(&env.id, &token).await.unwrap();
    fx.manager.restart_server(&env.id, &token).await.unwrap();

    assert_eq!(fx.server.stop_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.server.start_calls.load(Ordering::SeqCst), 2);
    let after = fx.manager.get_environment_with_status(&env.id).unwrap();
    assert_eq!(after.status, EnvironmentStatus::Running);
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_unknown_id_is_not_found() {
    let fx = fixture();
    fx.manager.initialize().await;
    create_data_science_env(&fx.manager).await;
    let saves_before = fx.store.save_calls.load(Ordering::SeqCst);

    let result = fx
        .manager
        .delete_environment("nope", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(EnvironmentError::NotFound(_))));
    assert_eq!(fx.manager.list_environments().len(), 1);
    assert_eq!(fx.store.save_calls.load(Ordering::SeqCst), saves_before);
}

#[tokio::test]
async fn test_delete_stops_running_server_first() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;
    let token = CancellationToken::new();

    fx.manager.start_server(&env.id, &token).await.unwrap();
    fx.manager.delete_environment(&env.id, &token).await.unwrap();

    assert_eq!(fx.server.stop_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        fx.server.stopped_ids.lock().unwrap().clone(),
        vec![env.id.clone()]
    );
    assert!(fx.manager.get_environment(&env.id).is_none());
    assert!(fx.store.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_aborts_when_stop_fails() {
    let fx = fixture_with(
        MockInstaller::default(),
        MockServerClient {
            fail_stop: true,
            ..Default::default()
        },
    );
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;
    let token = CancellationToken::new();

    fx.manager.start_server(&env.id, &token).await.unwrap();
    let result = fx.manager.delete_environment(&env.id, &token).await;

    assert!(matches!(result, Err(EnvironmentError::Collaborator { .. })));
    let still_there = fx.manager.get_environment_with_status(&env.id).unwrap();
    assert_eq!(still_there.status, EnvironmentStatus::Running);
}

#[tokio::test]
async fn test_delete_cancelled_after_stop_keeps_record() {
    let server = MockServerClient::default();
    let token = CancellationToken::new();
    *server.cancel_on_stop.lock().unwrap() = Some(token.clone());

    let fx = fixture_with(MockInstaller::default(), server);
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;

    fx.manager
        .start_server(&env.id, &CancellationToken::new())
        .await
        .unwrap();
    let result = fx.manager.delete_environment(&env.id, &token).await;

    assert!(matches!(result, Err(EnvironmentError::Cancelled)));
    // The record survives, and the cancellation landed before the registry
    // write, so the server belief is untouched; the next stop or start
    // reconciles it through the client's idempotent per-id behavior.
    let after = fx.manager.get_environment_with_status(&env.id).unwrap();
    assert_eq!(after.status, EnvironmentStatus::Running);
    assert_eq!(fx.server.stop_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Touch
// =============================================================================

#[tokio::test]
async fn test_update_last_used_touches_timestamp() {
    let fx = fixture();
    fx.manager.initialize().await;
    let env = create_data_science_env(&fx.manager).await;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    fx.manager.update_last_used(&env.id).await;

    let after = fx.manager.get_environment(&env.id).unwrap();
    assert!(after.last_used_at > env.last_used_at);
}

#[tokio::test]
async fn test_update_last_used_ignores_unknown_id() {
    let fx = fixture();
    fx.manager.initialize().await;
    let saves_before = fx.store.save_calls.load(Ordering::SeqCst);

    fx.manager.update_last_used("nope").await;

    assert_eq!(fx.store.save_calls.load(Ordering::SeqCst), saves_before);
}

// =============================================================================
// Reload (file-backed store)
// =============================================================================

#[tokio::test]
async fn test_no_server_survives_reload() {
    let temp = tempfile::TempDir::new().unwrap();
    let store_path = temp.path().join("environments.json");

    let installer = Arc::new(MockInstaller::default());
    let server = Arc::new(MockServerClient::default());

    let manager = EnvironmentManager::with_venv_base_dir(
        Arc::new(JsonFileStore::new(&store_path)),
        installer.clone(),
        server.clone(),
        temp.path().join("envs"),
    );
    manager.initialize().await;
    let env = create_data_science_env(&manager).await;
    manager
        .start_server(&env.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        manager.get_environment_with_status(&env.id).unwrap().status,
        EnvironmentStatus::Running
    );

    // Editor restart: a fresh manager over the same store.
    let reloaded = EnvironmentManager::with_venv_base_dir(
        Arc::new(JsonFileStore::new(&store_path)),
        installer,
        server,
        temp.path().join("envs"),
    );
    reloaded.initialize().await;

    let with_status = reloaded.get_environment_with_status(&env.id).unwrap();
    assert!(with_status.environment.server_info.is_none());
    assert_eq!(with_status.status, EnvironmentStatus::Stopped);
    // Venv knowledge survives; only the server belief is reset.
    assert_eq!(
        with_status.environment.toolkit_version.as_deref(),
        Some("0.2.30")
    );
}

// =============================================================================
// Notifications and view projection
// =============================================================================

#[tokio::test]
async fn test_mutations_fire_change_notifications() {
    let fx = fixture();
    let mut rx = fx.manager.subscribe();

    fx.manager.initialize().await;
    assert!(rx.try_recv().is_ok());

    let env = create_data_science_env(&fx.manager).await;
    assert!(rx.try_recv().is_ok());

    // Notification fires only after the persist completed: re-reading the
    // store from a listener must observe the new record.
    let persisted = fx.store.records.lock().unwrap().clone();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, env.id);
}

#[tokio::test]
async fn test_tree_projection_recomputes_from_manager() {
    let fx = fixture();
    fx.manager.initialize().await;
    let provider = EnvironmentTreeProvider::new(fx.manager.clone());

    assert!(provider.environments().is_empty());
    assert!(provider.info_rows("nope").is_empty());

    let env = create_data_science_env(&fx.manager).await;
    let nodes = provider.environments();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].label, "Data Science");
    assert_eq!(nodes[0].status, EnvironmentStatus::Stopped);

    fx.manager
        .start_server(&env.id, &CancellationToken::new())
        .await
        .unwrap();

    let nodes = provider.environments();
    assert_eq!(nodes[0].status, EnvironmentStatus::Running);
    let rows = provider.info_rows(&env.id);
    assert!(rows
        .iter()
        .any(|row| row.label == "Server" && row.value == "http://localhost:8888"));
    assert!(rows
        .iter()
        .any(|row| row.label == "Toolkit" && row.value == "0.2.30"));
}
