//! Error taxonomy for manager operations.

use thiserror::Error;

/// Failures surfaced by [`EnvironmentManager`] operations.
///
/// [`EnvironmentManager`]: crate::manager::EnvironmentManager
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The referenced environment id is not in the registry.
    #[error("Environment not found: {0}")]
    NotFound(String),

    /// The operation observed a cancellation before completing a
    /// mutation. State is unchanged.
    #[error("Operation cancelled")]
    Cancelled,

    /// The toolkit installer or server client failed. The source error is
    /// preserved verbatim; the manager never retries.
    #[error("{context}: {source}")]
    Collaborator {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// Persisting the registry failed. The in-memory registry may now be
    /// ahead of durable storage until the next successful save.
    #[error("Failed to persist environments: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl EnvironmentError {
    /// Whether this failure was a user cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EnvironmentError::Cancelled)
    }
}
