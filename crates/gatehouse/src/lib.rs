//! # Gatehouse
//!
//! Lifecycle management for short-lived, per-identity durable entities
//! — sessions and verification tokens — on an actor-per-key runtime,
//! plus an authorization gate that admits or rejects every protected
//! call based on the live state of the caller's session.
//!
//! Two guarantees drive the design:
//!
//! 1. Every session and token eventually expires and its state is
//!    cleared **exactly once**, even if the owning actor was evicted
//!    and is only reconstructed when its durable reminder fires.
//! 2. Authorization consults the session actor's current serialized
//!    state, so negative answers (no session, closed, expired) are as
//!    trustworthy as positive ones.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gatehouse::prelude::*;
//!
//! # async fn demo() -> Result<(), gatehouse::GatehouseError> {
//! let gh = Gatehouse::builder().build(MemoryStateStore::new());
//!
//! let mut model = CreateSessionModel::default();
//! model.roles.push("admin".into());
//! gh.create_session("session-1", model).await?;
//!
//! let policy = AccessPolicy::require_role("admin");
//! let ctx = CallContext::with_session_id("session-1");
//! let report = gh.gate().invoke(&ctx, &policy, || async { "admitted" }).await?;
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

mod app;
mod error;
mod interceptor;
mod policy;

pub use app::{Gatehouse, GatehouseBuilder};
pub use error::GatehouseError;
pub use interceptor::{Admission, AuthError, AuthorizationGate, CallContext, SESSION_ID_KEY};
pub use policy::AccessPolicy;

/// The commonly used types, re-exported for one-line imports.
pub mod prelude {
    pub use crate::{
        AccessPolicy, Admission, AuthError, AuthorizationGate, CallContext,
        Gatehouse, GatehouseBuilder, GatehouseError,
    };
    pub use gatehouse_model::{
        ClaimValue, CreateSessionModel, CreateTokenModel, EntityRef,
        SessionRecord, SessionStatus, TokenKind, TokenRecord,
    };
    pub use gatehouse_runtime::{MemoryStateStore, StateStore};
    pub use gatehouse_session::{SessionError, SessionOptions};
    pub use gatehouse_token::{
        ExpiryObserver, NoopObserver, TokenError, generate_token_value,
    };
}
