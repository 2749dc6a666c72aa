//! Error types for the session layer.

use gatehouse_model::ModelError;
use gatehouse_runtime::RuntimeError;

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The create model was malformed. No state was written and the
    /// actor unloaded.
    #[error("invalid session request: {0}")]
    Validation(#[from] ModelError),

    /// No record exists for this session id — never created, expired,
    /// or already cleared.
    #[error("session does not exist or has expired")]
    NotFound,

    /// The actor could not be reached even after reactivation.
    #[error("session actor is unavailable")]
    Unavailable,

    /// The underlying store failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
