//! Progress reporting for toolkit installation.
//!
//! Provides [`ToolkitProgress`] events covering the lifecycle of a venv
//! from cache check through ready-to-use, and a [`ProgressHandler`] trait
//! that consumers implement to route events to their UI layer.

use serde::Serialize;

/// Progress phases during toolkit installation.
///
/// Serializable for transport to an editor UI.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ToolkitProgress {
    /// Starting environment preparation.
    Starting { venv_path: String },
    /// Using an existing environment with the toolkit already installed.
    CacheHit { venv_path: String },
    /// Creating the virtual environment.
    CreatingVenv,
    /// Installing packages into the environment.
    InstallingPackages { packages: Vec<String> },
    /// Environment is ready.
    Ready {
        venv_path: String,
        python_path: String,
    },
    /// An error occurred.
    Error { message: String },
}

/// Trait for receiving toolkit progress events.
///
/// Implement this to route progress to your UI layer.
pub trait ProgressHandler: Send + Sync {
    /// Called for each progress phase during toolkit installation.
    fn on_progress(&self, phase: ToolkitProgress);
}

/// Log-only progress handler.
///
/// Writes progress phases to the `log` crate at info level.
pub struct LogHandler;

impl ProgressHandler for LogHandler {
    fn on_progress(&self, phase: ToolkitProgress) {
        match &phase {
            ToolkitProgress::Starting { venv_path } => {
                log::info!("[toolkit] Preparing environment at {venv_path}");
            }
            ToolkitProgress::CacheHit { venv_path } => {
                log::info!("[toolkit] Cache hit: {venv_path}");
            }
            ToolkitProgress::CreatingVenv => {
                log::info!("[toolkit] Creating virtual environment...");
            }
            ToolkitProgress::InstallingPackages { packages } => {
                log::info!("[toolkit] Installing packages: {packages:?}");
            }
            ToolkitProgress::Ready {
                venv_path,
                python_path,
            } => {
                log::info!("[toolkit] Ready: venv={venv_path} python={python_path}");
            }
            ToolkitProgress::Error { message } => {
                log::error!("[toolkit] Error: {message}");
            }
        }
    }
}
