//! Durable entity records for Gatehouse.
//!
//! This crate defines the persisted shape of the two entity kinds the
//! framework manages, and the models callers supply to create them:
//!
//! - **Types** ([`TokenRecord`], [`SessionRecord`], [`SessionStatus`],
//!   [`ClaimValue`], [`EntityRef`]) — the records that live in the
//!   durable store, one per logical entity.
//! - **Create models** ([`CreateTokenModel`], [`CreateSessionModel`]) —
//!   validated input for the create operations.
//! - **Errors** ([`ModelError`]) — what makes a create model malformed.
//!
//! # Architecture
//!
//! The model layer sits below everything else. It doesn't know about
//! actors, stores, or schedulers — it only defines data and its
//! validity rules.
//!
//! ```text
//! Store (bytes) → Model (records) → Actors (lifecycle + decisions)
//! ```
//!
//! # Versioning
//!
//! Records are persisted as structured data and must stay readable as
//! fields are added. New optional fields carry `#[serde(default)]` so an
//! older payload decodes with empty/zero values.

mod error;
mod types;

pub use error::ModelError;
pub use types::{
    ClaimValue, CreateSessionModel, CreateTokenModel, EntityRef,
    SessionRecord, SessionStatus, TokenKind, TokenRecord,
};
