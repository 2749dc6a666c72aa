//! Owner-notification hook for expired tokens.
//!
//! When a token expires through the scheduled path, the identity that
//! owns it usually wants to know — to invalidate a pending email flow,
//! surface a "link expired" message, or issue a fresh token. What that
//! identity actually is lives outside this framework, so the
//! notification is a trait the host implements.

use gatehouse_model::{EntityRef, TokenKind};

/// Receives a callback when a token expires via timer or reminder.
///
/// # Trait bounds
///
/// - `Send + Sync` — one observer instance is shared by every token
///   actor in the process.
/// - `'static` — it lives as long as the directory that holds it.
///
/// # Contract
///
/// Called only for scheduled expiration, only when the token's owner
/// reference is set, and after the record has been cleared. The call
/// carries no reply: the token is already gone regardless of what the
/// observer does. Delivery follows the reminder's at-least-once
/// semantics, so an observer that must not double-act should key off
/// `(kind, value)`.
pub trait ExpiryObserver: Send + Sync + 'static {
    /// A token owned by `owner` expired and its state was cleared.
    fn token_expired(
        &self,
        owner: &EntityRef,
        kind: TokenKind,
        value: &str,
    ) -> impl std::future::Future<Output = ()> + Send;
}

/// An observer that ignores every expiration.
///
/// The default wiring — deployments that don't care about owner
/// notification use this.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExpiryObserver for NoopObserver {
    async fn token_expired(
        &self,
        _owner: &EntityRef,
        _kind: TokenKind,
        _value: &str,
    ) {
    }
}
