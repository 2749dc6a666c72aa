//! Unified error type for the Gatehouse framework.

use gatehouse_model::ModelError;
use gatehouse_runtime::RuntimeError;
use gatehouse_session::SessionError;
use gatehouse_token::TokenError;

use crate::AuthError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `gatehouse` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GatehouseError {
    /// A malformed create model.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A runtime-level error (store, reminders, actor plumbing).
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A token-level error (validation, not found, unavailable).
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A session-level error (validation, not found, unavailable).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An authorization rejection (missing session id, denied).
    #[error(transparent)]
    Auth(#[from] AuthError),
}
