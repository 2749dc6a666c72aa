//! Host-runtime contracts for Gatehouse.
//!
//! The actor runtime proper — placement, failover, clustering — is not
//! implemented here. This crate defines the two primitives the entity
//! actors consume from their host, plus in-process reference
//! implementations good enough to run and test the whole stack on a
//! single node:
//!
//! 1. **Durable state** — the [`StateStore`] byte store and the typed
//!    [`PersistedState`] wrapper each actor owns. Record existence is
//!    the framework's liveness signal, so the wrapper makes
//!    [`record_exists`](PersistedState::record_exists) cheap and
//!    explicit.
//! 2. **Durable reminders** — [`ReminderService`], a schedule table that
//!    outlives any actor task, with a dispatcher that delivers due
//!    entries (at-least-once, possibly late) until they are cancelled.
//!
//! # How it fits in the stack
//!
//! ```text
//! Actors (above)   ← own a PersistedState, arm reminders for expiry
//!     ↕
//! Runtime (this crate)  ← stores bytes, fires schedule entries
//! ```
//!
//! In-memory timers, by contrast, belong to the actor task itself and
//! die with it — see the expiry crate.

#![allow(async_fn_in_trait)]

mod error;
mod reminder;
mod store;

pub use error::RuntimeError;
pub use reminder::{
    ReminderDelivery, ReminderService, ReminderTick,
};
pub use store::{MemoryStateStore, PersistedState, StateStore};
