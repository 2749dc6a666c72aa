//! Error types for the token layer.

use gatehouse_model::ModelError;
use gatehouse_runtime::RuntimeError;

/// Errors that can occur during token operations.
///
/// All of these are returned as values — a failed verify or create never
/// leaves the caller wondering whether a side effect happened. Writes
/// are committed before success is reported, and validation failures
/// write nothing at all.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The create model was malformed. No state was written and the
    /// actor unloaded.
    #[error("invalid token request: {0}")]
    Validation(#[from] ModelError),

    /// No record exists for this token — never created, expired, or
    /// already cleared. These cases are deliberately indistinguishable.
    #[error("token does not exist or has expired")]
    NotFound,

    /// The actor could not be reached even after reactivation.
    #[error("token actor is unavailable")]
    Unavailable,

    /// The underlying store failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
