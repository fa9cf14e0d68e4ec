//! Kernel environment management for the notebook editor.
//!
//! A kernel environment is a named, persisted record tying together a
//! Python interpreter, an isolated virtual environment, and (while one is
//! running) a kernel server process. This crate owns the environment
//! lifecycle:
//!
//! - [`EnvironmentManager`]: the in-memory registry and its
//!   create/update/delete/start/stop/restart operations
//! - [`EnvironmentStore`] / [`JsonFileStore`]: durable persistence of the
//!   registry's serializable subset (running-server details are never
//!   persisted; no server appears to survive an editor restart)
//! - [`ToolkitInstaller`] / [`ServerLifecycle`]: the injected
//!   collaborators that do the actual venv/package work and process
//!   supervision, with production adapters over the `toolkit-env` and
//!   `kernel-server` crates
//! - [`EnvironmentTreeProvider`]: a stateless display projection for the
//!   editor's tree view, recomputed on every query
//!
//! The manager emits a zero-payload change notification after every
//! persisted mutation; the tree provider (and any other observer)
//! subscribes and re-queries.

pub mod collaborators;
pub mod error;
pub mod local_server;
pub mod manager;
pub mod model;
pub mod store;
pub mod uv_toolkit;
pub mod view;

// Re-export key types
pub use collaborators::{ServerLifecycle, ToolkitInstall, ToolkitInstaller};
pub use error::EnvironmentError;
pub use local_server::LocalServerClient;
pub use manager::EnvironmentManager;
pub use model::{
    CreateEnvironmentOptions, Environment, EnvironmentStatus, EnvironmentUpdate,
    EnvironmentWithStatus, PythonInterpreter, ServerInfo,
};
pub use store::{EnvironmentStore, JsonFileStore};
pub use uv_toolkit::UvToolkitInstaller;
pub use view::EnvironmentTreeProvider;
