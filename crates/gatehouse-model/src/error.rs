//! Error types for the model layer.

/// Reasons a create model is rejected as malformed.
///
/// Validation runs before any state is written, so a `ModelError` always
/// means "nothing happened" — the caller can correct the input and retry
/// without worrying about a half-created entity.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The token value is empty. The value is the entity's key, so an
    /// empty value would address no actor at all.
    #[error("token value must not be empty")]
    EmptyTokenValue,

    /// The requested lifetime is zero. A zero-lifetime entity would be
    /// expired at the moment of creation, which is treated as malformed
    /// input rather than an instant no-op.
    #[error("lifetime must be greater than zero")]
    ZeroLifetime,

    /// A role entry in the create model is empty. Empty role strings can
    /// never match a requirement and usually indicate a mapping bug in
    /// the caller.
    #[error("role names must not be empty")]
    EmptyRole,
}
