//! Python environment and kernel toolkit management via `uv`.
//!
//! This crate provides the machinery behind the editor's toolkit installer:
//!
//! - Locating the `uv` binary on PATH (cached per process)
//! - Creating virtual environments for kernel environments
//! - Installing the kernel toolkit (ipykernel + jupyter-server) and any
//!   user-requested extra packages
//! - Reporting the installed toolkit version
//!
//! # Progress Reporting
//!
//! Operations that create or mutate environments accept a
//! [`ProgressHandler`] to report phases like venv creation and package
//! installation. Consumers implement this trait to route progress to their
//! UI (tree view busy indicators, status bar, logs, etc.).
//!
//! ```ignore
//! use toolkit_env::progress::{LogHandler, ProgressHandler};
//!
//! let handler = std::sync::Arc::new(LogHandler);
//! let install = toolkit_env::uv::ensure_toolkit(&interpreter, &venv, handler).await?;
//! println!("toolkit {}", install.toolkit_version);
//! ```

pub mod progress;
pub mod tools;
pub mod uv;

// Re-export key types
pub use progress::{LogHandler, ProgressHandler, ToolkitProgress};
pub use uv::ToolkitInstallation;
