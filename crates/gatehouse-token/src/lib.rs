//! Verification token actors for Gatehouse.
//!
//! One logical actor per `(kind, value)` token. The actor owns the
//! persisted [`TokenRecord`](gatehouse_model::TokenRecord), serializes
//! every operation against it, and drives the dual-path expiration
//! schedule:
//!
//! 1. **Create** — validate, write the record, arm expiry
//! 2. **Verify / Get** — pure existence reads; absence reads as expired
//! 3. **Expire** — timer tick or reminder clears the record exactly
//!    once and notifies the owning identity (if any)
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade / interceptor (above)  ← create and verify tokens
//!     ↕
//! Token layer (this crate)  ← per-value actors, owner notification
//!     ↕
//! Expiry + runtime (below)  ← schedule, store, reminders
//! ```

#![allow(async_fn_in_trait)]

mod actor;
mod directory;
mod error;
mod observer;

pub use actor::{TokenHandle, generate_token_value};
pub use directory::TokenDirectory;
pub use error::TokenError;
pub use observer::{ExpiryObserver, NoopObserver};
