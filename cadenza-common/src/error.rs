//! Common error types for Cadenza

use thiserror::Error;

/// Common result type for Cadenza operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the queue engine and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Remote server unreachable or the request timed out
    ///
    /// Recoverable: the engine keeps the optimistic snapshot and parks the
    /// failed operation for a lazy retry.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The server rejected the source used to seed a new queue
    ///
    /// Fatal to that one create; surfaced to the caller as a failed playback
    /// start.
    #[error("Invalid queue source: {0}")]
    InvalidSource(String),

    /// A reconciliation lost the version race and was discarded
    ///
    /// Expected under concurrent mutation; logged at debug level, never
    /// user-visible.
    #[error("Stale reconciliation: store at version {actual}, expected {expected}")]
    StaleReconciliation { expected: u64, actual: u64 },

    /// Server payload violated the queue contract (duplicate item ids,
    /// dangling selection); truth must be re-fetched
    #[error("Queue desync: {0}")]
    Desync(String),

    /// A mutation intent was issued with no active queue
    #[error("No active queue")]
    NoQueue,

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures the engine handles by parking the operation for a
    /// lazy retry rather than surfacing it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::RemoteUnavailable(_))
    }
}
