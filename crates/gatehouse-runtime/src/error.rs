//! Error types for the runtime layer.

/// Errors surfaced by the host-runtime primitives.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Serializing a record for the store failed.
    #[error("state encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserializing a stored record failed.
    ///
    /// With a versionable layout this should only happen on genuinely
    /// corrupt payloads — added fields decode via their defaults.
    #[error("state decode failed: {0}")]
    Decode(serde_json::Error),

    /// The backing store reported a failure.
    #[error("state backend error: {0}")]
    Backend(String),

    /// The target actor's command channel is gone and reactivation did
    /// not help.
    #[error("{kind} actor {key} is unavailable")]
    ActorUnavailable {
        /// The entity kind of the unreachable actor.
        kind: &'static str,
        /// The key of the unreachable actor.
        key: String,
    },
}
