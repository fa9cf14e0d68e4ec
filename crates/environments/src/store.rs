//! Durable persistence for environment records.
//!
//! The whole registry is stored under a single namespace as one JSON
//! array; every save replaces the array. Loading is deliberately
//! forgiving: a malformed record is logged and skipped, an unreadable
//! store yields an empty list, and no validation I/O happens (interpreter
//! paths are taken at face value until first use).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::{Environment, PythonInterpreter};

/// Persisted form of an [`Environment`].
///
/// There is no field for server connection info: serialization cannot
/// carry a running server across an editor restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEnvironment {
    pub id: String,
    pub name: String,
    pub python_interpreter_path: String,
    pub venv_path: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolkit_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&Environment> for StoredEnvironment {
    fn from(env: &Environment) -> Self {
        Self {
            id: env.id.clone(),
            name: env.name.clone(),
            python_interpreter_path: env.python_interpreter.path.to_string_lossy().to_string(),
            venv_path: env.venv_path.to_string_lossy().to_string(),
            created_at: env.created_at,
            last_used_at: env.last_used_at,
            packages: env.packages.clone(),
            toolkit_version: env.toolkit_version.clone(),
            description: env.description.clone(),
        }
    }
}

impl StoredEnvironment {
    /// Rebuild the runtime record. The interpreter reference comes purely
    /// from the stored path and `server_info` starts out absent.
    pub fn into_environment(self) -> Environment {
        Environment {
            id: self.id,
            name: self.name,
            python_interpreter: PythonInterpreter::from_path(self.python_interpreter_path),
            venv_path: PathBuf::from(self.venv_path),
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            packages: self.packages,
            toolkit_version: self.toolkit_version,
            description: self.description,
            server_info: None,
        }
    }
}

/// Persistence adapter for the environment registry.
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    /// Load all records. Never fails: malformed records are skipped with a
    /// log entry and an unreadable store yields an empty list.
    async fn load(&self) -> Vec<Environment>;

    /// Replace the persisted array with `environments`.
    async fn save(&self, environments: &[Environment]) -> Result<()>;

    /// Remove all persisted records.
    async fn clear(&self) -> Result<()>;
}

/// File-backed store: one pretty-printed JSON array per user.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default store location under the user's config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("runebook")
            .join("environments.json")
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

#[async_trait]
impl EnvironmentStore for JsonFileStore {
    async fn load(&self) -> Vec<Environment> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("[env-store] Failed to read {:?}: {}", self.path, e);
                return Vec::new();
            }
        };

        // Parse the array loosely first so one bad record doesn't take the
        // rest down with it.
        let records: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!("[env-store] Failed to parse {:?}: {}", self.path, e);
                return Vec::new();
            }
        };

        let mut environments = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<StoredEnvironment>(record) {
                Ok(stored) => environments.push(stored.into_environment()),
                Err(e) => warn!("[env-store] Skipping malformed environment record: {}", e),
            }
        }
        environments
    }

    async fn save(&self, environments: &[Environment]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let stored: Vec<StoredEnvironment> =
            environments.iter().map(StoredEnvironment::from).collect();
        let json = serde_json::to_string_pretty(&stored)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
