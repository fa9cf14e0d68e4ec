//! Core data model for kernel environments.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Reference to a Python interpreter.
///
/// Reconstructed purely from the stored path when loading from disk; the
/// interpreter may no longer exist by then. Validity is checked at use
/// time (first server start), never at load time, so loading many
/// environments stays cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonInterpreter {
    /// Interpreter path; may be symbolic (e.g. `python3`) until a start
    /// resolves it to a concrete binary.
    pub path: PathBuf,
    /// Identifier derived from the path.
    pub id: String,
}

impl PythonInterpreter {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path.to_string_lossy().to_string();
        Self { path, id }
    }
}

/// Connection details for a running kernel server.
///
/// Held in memory only. This type is deliberately not serializable: the
/// persisted schema has no field for it, so a record loaded from disk is
/// always stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub url: String,
    pub jupyter_port: u16,
    pub lsp_port: u16,
    pub token: Option<String>,
}

/// A kernel environment record.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Unique id, assigned at creation and never reused.
    pub id: String,
    /// User-editable display name.
    pub name: String,
    pub python_interpreter: PythonInterpreter,
    /// Venv location, derived from the id at creation and immutable.
    pub venv_path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Updated on every successful server start and on explicit touch.
    pub last_used_at: DateTime<Utc>,
    /// Extra package specifiers requested by the user.
    pub packages: Option<Vec<String>>,
    /// Version reported by the last successful toolkit install.
    pub toolkit_version: Option<String>,
    pub description: Option<String>,
    /// Present iff a server is currently believed reachable.
    pub server_info: Option<ServerInfo>,
}

/// Derived run state of an environment. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentStatus {
    /// No server believed running.
    Stopped,
    /// A start is in flight.
    Starting,
    /// Connection info is held for a running server.
    Running,
}

impl std::fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentStatus::Stopped => write!(f, "stopped"),
            EnvironmentStatus::Starting => write!(f, "starting"),
            EnvironmentStatus::Running => write!(f, "running"),
        }
    }
}

/// An environment snapshot paired with its derived status.
#[derive(Debug, Clone)]
pub struct EnvironmentWithStatus {
    pub environment: Environment,
    pub status: EnvironmentStatus,
}

/// Options for creating a new environment.
#[derive(Debug, Clone)]
pub struct CreateEnvironmentOptions {
    pub name: String,
    pub python_interpreter: PythonInterpreter,
    pub packages: Option<Vec<String>>,
    pub description: Option<String>,
}

/// Partial patch for [`EnvironmentManager::update_environment`].
///
/// `None` fields are left untouched.
///
/// [`EnvironmentManager::update_environment`]: crate::manager::EnvironmentManager::update_environment
#[derive(Debug, Clone, Default)]
pub struct EnvironmentUpdate {
    pub name: Option<String>,
    pub packages: Option<Vec<String>>,
    pub description: Option<String>,
}

/// Venv location for an environment id.
///
/// A pure function of the id: two environments can never share a venv.
pub fn venv_path_for(base_dir: &Path, id: &str) -> PathBuf {
    base_dir.join(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(EnvironmentStatus::Stopped.to_string(), "stopped");
        assert_eq!(EnvironmentStatus::Starting.to_string(), "starting");
        assert_eq!(EnvironmentStatus::Running.to_string(), "running");
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&EnvironmentStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }

    #[test]
    fn test_venv_path_contains_id() {
        let path = venv_path_for(Path::new("/cache/envs"), "abc-123");
        assert_eq!(path, PathBuf::from("/cache/envs/abc-123"));
    }

    #[test]
    fn test_interpreter_id_derived_from_path() {
        let interpreter = PythonInterpreter::from_path("/usr/bin/python3");
        assert_eq!(interpreter.id, "/usr/bin/python3");
        assert_eq!(interpreter.path, PathBuf::from("/usr/bin/python3"));
    }
}
