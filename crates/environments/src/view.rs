//! Tree projection of environment state for the editor UI.
//!
//! The provider holds no state of its own: every query recomputes from
//! the manager, so the tree can never drift from the registry. The host
//! UI subscribes via [`EnvironmentTreeProvider::subscribe`] and re-queries
//! whenever an event arrives.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::manager::EnvironmentManager;
use crate::model::EnvironmentStatus;

/// A top-level tree node: one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentNode {
    pub id: String,
    pub label: String,
    pub status: EnvironmentStatus,
}

/// A detail row beneath an environment node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoRow {
    pub label: &'static str,
    pub value: String,
}

/// Read-only display projection of the environment registry.
pub struct EnvironmentTreeProvider {
    manager: Arc<EnvironmentManager>,
}

impl EnvironmentTreeProvider {
    pub fn new(manager: Arc<EnvironmentManager>) -> Self {
        Self { manager }
    }

    /// Signal stream for the host UI: each event means "re-query the tree".
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.manager.subscribe()
    }

    /// Top-level nodes, one per environment, in creation order.
    pub fn environments(&self) -> Vec<EnvironmentNode> {
        self.manager
            .list_environments()
            .iter()
            .filter_map(|env| self.manager.get_environment_with_status(&env.id))
            .map(|with_status| EnvironmentNode {
                id: with_status.environment.id.clone(),
                label: with_status.environment.name.clone(),
                status: with_status.status,
            })
            .collect()
    }

    /// Detail rows for one environment. Empty when the id is unknown.
    pub fn info_rows(&self, id: &str) -> Vec<InfoRow> {
        let Some(with_status) = self.manager.get_environment_with_status(id) else {
            return Vec::new();
        };
        let env = &with_status.environment;

        let mut rows = vec![
            InfoRow {
                label: "Status",
                value: with_status.status.to_string(),
            },
            InfoRow {
                label: "Interpreter",
                value: env.python_interpreter.path.display().to_string(),
            },
            InfoRow {
                label: "Venv",
                value: env.venv_path.display().to_string(),
            },
            InfoRow {
                label: "Created",
                value: env.created_at.to_rfc3339(),
            },
            InfoRow {
                label: "Last used",
                value: env.last_used_at.to_rfc3339(),
            },
        ];
        if let Some(version) = &env.toolkit_version {
            rows.push(InfoRow {
                label: "Toolkit",
                value: version.clone(),
            });
        }
        if let Some(packages) = &env.packages {
            rows.push(InfoRow {
                label: "Packages",
                value: packages.join(", "),
            });
        }
        if let Some(description) = &env.description {
            rows.push(InfoRow {
                label: "Description",
                value: description.clone(),
            });
        }
        if let Some(server) = &env.server_info {
            rows.push(InfoRow {
                label: "Server",
                value: server.url.clone(),
            });
        }
        rows
    }
}
